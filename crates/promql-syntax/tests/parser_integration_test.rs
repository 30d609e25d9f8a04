//! Integration tests for the PromQL parser crate.
//!
//! Tests cover the public `parse` entry point: tree shape and spans, partial
//! trees for malformed input, and semantic errors.

use promql_syntax::ast::{AggregateOp, BinaryOp, MatchOp};
use promql_syntax::{parse, parse_syntax, Expr, ExprKind, ParseErrorKind, ParseResult, Span};

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_ok(source: &str) -> ParseResult {
    let result = parse(source);
    assert!(
        result.errors.is_empty(),
        "expected no errors for {source:?}, got: {:?}",
        result.errors
    );
    assert!(result.root.is_some());
    result
}

fn kinds_preorder(expr: &Expr) -> Vec<ExprKind> {
    let mut out = vec![expr.kind()];
    for child in expr.children() {
        out.extend(kinds_preorder(child));
    }
    out
}

fn assert_nested(expr: &Expr) {
    for child in expr.children() {
        assert!(
            expr.span().covers(&child.span()),
            "child {:?} escapes parent {:?}",
            child.span(),
            expr.span()
        );
        assert_nested(child);
    }
}

// ============================================================================
// Well-formed Expressions
// ============================================================================

#[test]
fn test_root_span_excludes_surrounding_whitespace() {
    let result = parse_ok("  rate(foo[5m])  \n");
    assert_eq!(result.root.unwrap().span(), Span::new(2, 15));
}

#[test]
fn test_realistic_query_shape() {
    let source = r#"sum by (job) (rate(http_requests_total{status=~"5.."}[5m])) / ignoring(status) group_left sum by (job) (rate(http_requests_total[5m]))"#;
    let result = parse_ok(source);
    let root = result.root.unwrap();

    assert_eq!(root.span(), Span::new(0, source.len()));
    assert_eq!(
        kinds_preorder(&root),
        vec![
            ExprKind::Binary,
            ExprKind::Aggregate,
            ExprKind::Call,
            ExprKind::MatrixSelector,
            ExprKind::VectorSelector,
            ExprKind::Aggregate,
            ExprKind::Call,
            ExprKind::MatrixSelector,
            ExprKind::VectorSelector,
        ]
    );
    assert_nested(&root);

    let Expr::Binary(bin) = root.as_ref() else {
        panic!("expected binary root");
    };
    assert_eq!(bin.op, BinaryOp::Div);
    assert!(bin.matching.as_ref().is_some_and(|m| m.group.is_some()));
}

#[test]
fn test_case_insensitive_keywords() {
    let result = parse_ok("SUM BY (job) (foo) AND ON (job) bar OFFSET 5m");
    let root = result.root.unwrap();
    let Expr::Binary(bin) = root.as_ref() else {
        panic!("expected binary root");
    };
    assert_eq!(bin.op, BinaryOp::And);
    assert!(matches!(bin.lhs.as_ref(), Expr::Aggregate(a) if a.op == AggregateOp::Sum));
    assert_eq!(bin.rhs.kind(), ExprKind::Offset);
}

#[test]
fn test_matcher_spans() {
    let source = r#"up{job="api", instance!~"db.*"}"#;
    let result = parse_ok(source);
    let Expr::VectorSelector(sel) = result.root.as_deref().unwrap() else {
        panic!("expected selector");
    };
    assert_eq!(sel.matchers[0].span.text(source), r#"job="api""#);
    assert_eq!(sel.matchers[1].span.text(source), r#"instance!~"db.*""#);
    assert_eq!(sel.matchers[1].op, MatchOp::RegexNoMatch);
}

#[test]
fn test_multiline_query_with_comments() {
    let source = "# error ratio\nsum(rate(errors[5m]))\n  /\n# total\nsum(rate(requests[5m]))\n";
    let result = parse_ok(source);
    let root = result.root.unwrap();
    assert_eq!(root.span().text(source).lines().count(), 4);
    assert_nested(&root);
}

// ============================================================================
// Malformed Input
// ============================================================================

#[test]
fn test_empty_and_comment_only() {
    for source in ["", "# just a comment\n\n"] {
        let result = parse(source);
        assert!(result.root.is_none());
        assert_eq!(result.errors[0].kind, ParseErrorKind::EmptyInput);
    }
}

#[test]
fn test_partial_tree_for_trailing_garbage() {
    let result = parse("foo + bar )");
    assert!(!result.errors.is_empty());
    assert_eq!(result.root.unwrap().span(), Span::new(0, 9));
}

#[test]
fn test_partial_tree_is_not_type_checked() {
    let result = parse("nope(foo) )");
    assert!(result.errors.iter().all(|e| !e.is_semantic()));
    assert_eq!(result.root.unwrap().kind(), ExprKind::Call);
}

#[test]
fn test_no_tree_when_nothing_parses() {
    for source in ["(", ")", "*1", "{", "-="] {
        let result = parse(source);
        assert!(result.root.is_none(), "unexpected tree for {source:?}");
        assert!(!result.errors.is_empty());
    }
}

#[test]
fn test_error_spans_within_source() {
    for source in ["1 +", "foo{", "sum(", "foo[5m", "\"unterminated", "foo offset"] {
        let result = parse(source);
        assert!(!result.errors.is_empty(), "expected errors for {source:?}");
        for err in &result.errors {
            assert!(err.span.start <= err.span.end);
            assert!(err.span.end <= source.len(), "{err:?} for {source:?}");
        }
    }
}

// ============================================================================
// Semantic Errors
// ============================================================================

#[test]
fn test_semantic_errors_keep_tree() {
    let result = parse("rate(foo)");
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_semantic());
    assert_eq!(result.root.unwrap().kind(), ExprKind::Call);
}

#[test]
fn test_parse_syntax_skips_checks() {
    let result = parse_syntax("rate(foo)");
    assert!(result.is_ok());
}
