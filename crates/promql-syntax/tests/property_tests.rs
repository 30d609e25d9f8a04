//! Property-based tests for the PromQL parser.
//!
//! Run with: cargo test -p promql-syntax --test `property_tests`

use proptest::prelude::*;
use promql_syntax::{parse, Expr};

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_metric() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("up".to_string()),
        Just("http_requests_total".to_string()),
        Just("job:errors:rate5m".to_string()),
        Just(r#"node_cpu_seconds_total{mode="idle"}"#.to_string()),
        Just(r#"{__name__=~"go_.*", job!="x"}"#.to_string()),
    ]
}

fn arb_expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        arb_metric(),
        (0u32..1000).prop_map(|n| n.to_string()),
        arb_metric().prop_map(|m| format!("rate({m}[5m])")),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone(), prop_oneof![
                Just("+"), Just("-"), Just("*"), Just("/"), Just("and"), Just("or"), Just(">")
            ])
                .prop_map(|(l, r, op)| format!("{l} {op} {r}")),
            inner.clone().prop_map(|e| format!("({e})")),
            inner.clone().prop_map(|e| format!("-{e}")),
            inner.clone().prop_map(|e| format!("sum by (job) ({e})")),
            inner.prop_map(|e| format!("({e})[10m:1m]")),
        ]
    })
}

fn assert_children_nested(expr: &Expr) -> Result<(), TestCaseError> {
    for child in expr.children() {
        prop_assert!(
            expr.span().covers(&child.span()),
            "child {:?} escapes parent {:?}",
            child.span(),
            expr.span()
        );
        assert_children_nested(child)?;
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn parse_never_panics(source in "\\PC{0,40}") {
        let result = parse(&source);
        for err in &result.errors {
            prop_assert!(err.span.start <= err.span.end);
            prop_assert!(err.span.end <= source.len());
        }
    }

    #[test]
    fn generated_expressions_parse(source in arb_expr()) {
        let result = parse(&source);
        prop_assert!(
            result.errors.iter().all(|e| e.is_semantic()),
            "syntax errors for {:?}: {:?}",
            source,
            result.errors
        );
        let root = result.root.unwrap();
        prop_assert_eq!(root.span().start, 0);
        prop_assert_eq!(root.span().end, source.len());
        assert_children_nested(&root)?;
    }

    #[test]
    fn partial_trees_stay_within_source(source in arb_expr(), garbage in "[)\\]}, ]{1,4}") {
        let input = format!("{source}{garbage}");
        let result = parse(&input);
        if let Some(root) = &result.root {
            prop_assert!(root.span().end <= input.len());
            assert_children_nested(root)?;
        }
    }
}
