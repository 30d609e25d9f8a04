//! Hover handler for displaying information about the node under the cursor.
//!
//! Provides hover information for:
//! - Function calls: signature and description
//! - Aggregations: operator description and grouping
//! - Selectors: metric name, matchers and ranges
//! - Every node: kind, result type and source text

use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use promql_syntax::ast::{format_duration, Expr, GroupSide};
use promql_syntax::functions;

use super::utils::{position_to_offset, span_text, span_to_range};
use crate::cache::CompiledQuery;

/// Handle a hover request.
pub fn handle_hover(params: &HoverParams, query: &CompiledQuery) -> Option<Hover> {
    let position = params.text_document_position_params.position;
    let offset = position_to_offset(&query.text, position)?;
    let node = query.locate(offset)?;

    tracing::debug!("Hover on {} at {}", node.kind(), node.span());

    let source = span_text(&query.text, node.span());
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: describe(node, &source),
        }),
        range: Some(span_to_range(&query.text, node.span())),
    })
}

/// Build the Markdown description of a node.
pub fn describe(node: &Expr, source: &str) -> String {
    let mut info = format!("**{}** : `{}`\n\n", node.kind(), node.value_type());

    match node {
        Expr::Call(call) => match functions::function(&call.name) {
            Some(func) => {
                info.push_str(&format!("`{}`\n\n{}\n\n", func.signature(), func.doc));
            }
            None => info.push_str(&format!("Unknown function `{}`.\n\n", call.name)),
        },
        Expr::Aggregate(agg) => {
            info.push_str(&format!(
                "`{}`: {}\n\n",
                agg.op.name(),
                functions::aggregation_doc(agg.op)
            ));
            if let Some(grouping) = &agg.grouping {
                let clause = if grouping.without { "without" } else { "by" };
                info.push_str(&format!(
                    "**Grouping:** {clause} ({})\n\n",
                    grouping.labels.join(", ")
                ));
            }
        }
        Expr::VectorSelector(sel) => {
            if let Some(name) = &sel.name {
                info.push_str(&format!("**Metric:** `{name}`\n\n"));
            }
            if !sel.matchers.is_empty() {
                info.push_str("**Matchers:**\n");
                for m in &sel.matchers {
                    info.push_str(&format!("- `{}{}{:?}`\n", m.name, m.op.as_str(), m.value));
                }
                info.push('\n');
            }
        }
        Expr::MatrixSelector(matrix) => {
            info.push_str(&format!("**Range:** {}\n\n", format_duration(matrix.range)));
        }
        Expr::Subquery(sub) => {
            info.push_str(&format!("**Range:** {}\n\n", format_duration(sub.range)));
            if let Some(step) = sub.step {
                info.push_str(&format!("**Resolution:** {}\n\n", format_duration(step)));
            }
        }
        Expr::Offset(offset) => {
            let sign = if offset.negative { "-" } else { "" };
            info.push_str(&format!(
                "**Offset:** {sign}{}\n\n",
                format_duration(offset.offset)
            ));
        }
        Expr::Binary(bin) => {
            info.push_str(&format!("**Operator:** `{}`", bin.op));
            if bin.return_bool {
                info.push_str(" bool");
            }
            info.push_str("\n\n");
            if let Some(matching) = &bin.matching {
                if let Some((on, labels)) = &matching.on {
                    let clause = if *on { "on" } else { "ignoring" };
                    info.push_str(&format!(
                        "**Matching:** {clause} ({})\n\n",
                        labels.join(", ")
                    ));
                }
                if let Some(group) = &matching.group {
                    let side = match group.side {
                        GroupSide::Left => "group_left",
                        GroupSide::Right => "group_right",
                    };
                    info.push_str(&format!("**Grouping:** {side} ({})\n\n", group.labels.join(", ")));
                }
            }
        }
        Expr::NumberLiteral(num) => info.push_str(&format!("**Value:** {}\n\n", num.value)),
        Expr::StringLiteral(s) => info.push_str(&format!("**Value:** {:?}\n\n", s.value)),
        Expr::Unary(_) | Expr::Paren(_) => {}
    }

    info.push_str(&format!("```promql\n{source}\n```"));
    info
}
