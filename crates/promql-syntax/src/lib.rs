//! PromQL parser using chumsky parser combinators.
//!
//! This crate parses Prometheus query expressions into an [`Expr`] tree in
//! which every node knows the byte range of source text it covers. It is the
//! analysis front end of the PromQL language server.
//!
//! # Features
//!
//! - Full PromQL expression grammar (selectors, functions, aggregations,
//!   binary operators with vector matching, subqueries, offsets)
//! - Partial trees for malformed input
//! - Type checks matching Prometheus' own rules
//!
//! # Example
//!
//! ```
//! use promql_syntax::{parse, ExprKind, Span};
//!
//! let result = parse("sum by (job) (rate(http_requests_total[5m]))");
//! assert!(result.errors.is_empty());
//!
//! let root = result.root.unwrap();
//! assert_eq!(root.kind(), ExprKind::Aggregate);
//! assert_eq!(root.span(), Span::new(0, 44));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod check;
mod error;
pub mod functions;
mod parser;
mod span;

pub use ast::{Expr, ExprKind, ValueType};
pub use error::{ParseError, ParseErrorKind};
pub use span::Span;

use std::sync::Arc;

/// Result of parsing a PromQL expression.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// The expression tree, possibly partial when `errors` is not empty.
    pub root: Option<Arc<Expr>>,
    /// Syntax errors, or semantic errors when the syntax is valid.
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// Whether parsing produced no errors at all.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse PromQL source text.
///
/// Never fails: malformed input yields a partial or absent tree together with
/// the errors found. Type checks run only on syntactically valid input.
pub fn parse(source: &str) -> ParseResult {
    let (root, mut errors) = parser::parse(source);
    if errors.is_empty() {
        if let Some(root) = &root {
            errors = check::check(root);
        }
    }
    ParseResult {
        root: root.map(Arc::new),
        errors,
    }
}

/// Parse without running type checks.
pub fn parse_syntax(source: &str) -> ParseResult {
    let (root, errors) = parser::parse(source);
    ParseResult {
        root: root.map(Arc::new),
        errors,
    }
}
