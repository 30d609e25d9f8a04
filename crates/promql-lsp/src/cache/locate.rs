//! Position to node lookup.

use std::sync::Arc;

use promql_syntax::Expr;

use super::CompiledQuery;

/// Find the smallest node whose span contains the byte offset `pos`.
///
/// Containment is closed on both ends, so a cursor placed directly after the
/// last character of a node still resolves to that node. When two siblings
/// touch at `pos`, the later one wins. Returns `None` when there is no tree
/// or `pos` lies outside the root.
pub fn smallest_surrounding_node(root: Option<&Arc<Expr>>, pos: usize) -> Option<&Arc<Expr>> {
    let mut current = root?;
    if !current.span().contains(pos) {
        return None;
    }

    loop {
        let next = current
            .children()
            .into_iter()
            .filter(|child| child.span().contains(pos))
            .last();

        match next {
            Some(child) if current.span().covers(&child.span()) => current = child,
            Some(child) => {
                tracing::warn!(
                    "Child span {} escapes parent span {}, stopping lookup at {}",
                    child.span(),
                    current.span(),
                    pos
                );
                return Some(current);
            }
            None => return Some(current),
        }
    }
}

/// Find the smallest node of a compiled query containing `pos`.
pub fn locate(query: &CompiledQuery, pos: usize) -> Option<&Arc<Expr>> {
    smallest_surrounding_node(query.root.as_ref(), pos)
}
