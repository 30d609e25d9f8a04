//! Compiled query cache.
//!
//! Each open document is parsed once per version into an immutable
//! [`CompiledQuery`]. Request handlers share these snapshots through [`Arc`]
//! and never observe a half-built entry: parsing happens before the map lock
//! is taken, and publication is a single insert under the write lock.

pub mod locate;

use std::collections::HashMap;
use std::sync::Arc;

use lsp_types::Uri;
use parking_lot::RwLock;
use promql_syntax::{Expr, ParseError};
use ropey::Rope;

/// The parsed state of one document version.
#[derive(Debug)]
pub struct CompiledQuery {
    /// Document identifier.
    pub uri: Uri,
    /// Document version the query was compiled from.
    pub version: i32,
    /// Document text.
    pub text: Rope,
    /// Expression tree, absent when nothing could be parsed.
    pub root: Option<Arc<Expr>>,
    /// Syntax or semantic errors.
    pub errors: Vec<ParseError>,
}

impl CompiledQuery {
    /// Parse `text` into a compiled query.
    pub fn compile(uri: Uri, version: i32, text: &str) -> Self {
        let result = promql_syntax::parse(text);
        Self {
            uri,
            version,
            text: Rope::from_str(text),
            root: result.root,
            errors: result.errors,
        }
    }

    /// Get the document content as a string.
    pub fn source(&self) -> String {
        self.text.to_string()
    }

    /// Smallest node surrounding the byte offset `pos`.
    pub fn locate(&self, pos: usize) -> Option<&Arc<Expr>> {
        locate::locate(self, pos)
    }
}

/// Per-document store of compiled queries.
///
/// A stored entry is only replaced by a compile of the same or a newer
/// version, so a slow parse of an old version can never overwrite the
/// result for a newer one.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<Uri, Arc<CompiledQuery>>>,
}

impl QueryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text` and publish the result for `uri`.
    ///
    /// Always returns the freshly compiled query, even when a newer version
    /// is already stored and the result is therefore not published.
    pub fn compile(&self, uri: &Uri, version: i32, text: &str) -> Arc<CompiledQuery> {
        let compiled = Arc::new(CompiledQuery::compile(uri.clone(), version, text));

        let mut entries = self.entries.write();
        match entries.get(uri) {
            Some(stored) if stored.version > version => {
                tracing::debug!(
                    "Discarding version {} of {}, version {} is already stored",
                    version,
                    uri.as_str(),
                    stored.version
                );
            }
            _ => {
                entries.insert(uri.clone(), Arc::clone(&compiled));
            }
        }

        compiled
    }

    /// Get the current compiled query for a document.
    pub fn get(&self, uri: &Uri) -> Option<Arc<CompiledQuery>> {
        self.entries.read().get(uri).cloned()
    }

    /// Find the smallest node surrounding the byte offset `pos` in the
    /// current version of a document.
    pub fn lookup(&self, uri: &Uri, pos: usize) -> Option<Arc<Expr>> {
        let query = self.get(uri)?;
        query.locate(pos).cloned()
    }

    /// Drop a document, returning its last compiled query.
    pub fn evict(&self, uri: &Uri) -> Option<Arc<CompiledQuery>> {
        self.entries.write().remove(uri)
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no documents are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Identifiers of all cached documents.
    pub fn uris(&self) -> Vec<Uri> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promql_syntax::{ExprKind, Span};
    use std::str::FromStr;

    fn uri(path: &str) -> Uri {
        Uri::from_str(&format!("file:///{path}")).unwrap()
    }

    #[test]
    fn test_compile_and_get() {
        let cache = QueryCache::new();
        let doc = uri("a.promql");

        let compiled = cache.compile(&doc, 1, "rate(foo[5m])");
        assert_eq!(compiled.version, 1);
        assert!(compiled.errors.is_empty());

        let stored = cache.get(&doc).unwrap();
        assert!(Arc::ptr_eq(&compiled, &stored));
        assert_eq!(stored.source(), "rate(foo[5m])");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_late_older_version_is_discarded() {
        let cache = QueryCache::new();
        let doc = uri("a.promql");

        cache.compile(&doc, 2, "foo");
        let late = cache.compile(&doc, 1, "bar");

        assert_eq!(late.version, 1);
        assert_eq!(late.source(), "bar");
        let stored = cache.get(&doc).unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.source(), "foo");
    }

    #[test]
    fn test_same_version_replaces() {
        let cache = QueryCache::new();
        let doc = uri("a.promql");

        cache.compile(&doc, 3, "foo");
        cache.compile(&doc, 3, "bar");
        assert_eq!(cache.get(&doc).unwrap().source(), "bar");
    }

    #[test]
    fn test_failed_parse_is_cached() {
        let cache = QueryCache::new();
        let doc = uri("a.promql");

        let compiled = cache.compile(&doc, 1, "");
        assert!(compiled.root.is_none());
        assert_eq!(compiled.errors.len(), 1);
        assert!(cache.get(&doc).is_some());
        assert!(cache.lookup(&doc, 0).is_none());
    }

    #[test]
    fn test_lookup() {
        let cache = QueryCache::new();
        let doc = uri("a.promql");
        cache.compile(&doc, 1, "sum(rate(foo[5m]))");

        let node = cache.lookup(&doc, 10).unwrap();
        assert_eq!(node.kind(), ExprKind::VectorSelector);
        assert_eq!(node.span(), Span::new(9, 12));

        assert!(cache.lookup(&doc, 19).is_none());
        assert!(cache.lookup(&uri("missing.promql"), 0).is_none());
    }

    #[test]
    fn test_lookup_outlives_newer_version() {
        let cache = QueryCache::new();
        let doc = uri("a.promql");
        cache.compile(&doc, 1, "foo + bar");

        let node = cache.lookup(&doc, 1).unwrap();
        cache.compile(&doc, 2, "1");
        assert_eq!(node.kind(), ExprKind::VectorSelector);
        assert_eq!(node.span(), Span::new(0, 3));
    }

    #[test]
    fn test_evict() {
        let cache = QueryCache::new();
        let a = uri("a.promql");
        let b = uri("b.promql");
        cache.compile(&a, 1, "foo");
        cache.compile(&b, 1, "bar");

        assert_eq!(cache.evict(&a).map(|q| q.version), Some(1));
        assert!(cache.get(&a).is_none());
        assert!(cache.evict(&a).is_none());
        assert_eq!(cache.uris(), vec![b.clone()]);

        cache.evict(&b);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_compiles_keep_highest_version() {
        let cache = Arc::new(QueryCache::new());
        let doc = uri("a.promql");

        let handles: Vec<_> = (1..=16)
            .map(|version| {
                let cache = Arc::clone(&cache);
                let doc = doc.clone();
                std::thread::spawn(move || {
                    let text = format!("metric_{version} + {version}");
                    cache.compile(&doc, version, &text);
                    cache.lookup(&doc, 0)
                })
            })
            .collect();

        for handle in handles {
            let node = handle.join().unwrap();
            assert!(node.is_some());
        }

        let stored = cache.get(&doc).unwrap();
        assert_eq!(stored.version, 16);
        assert_eq!(stored.source(), "metric_16 + 16");
    }
}
