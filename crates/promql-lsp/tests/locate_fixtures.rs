//! Locator checks over a broad corpus of well-formed and malformed queries.
//!
//! For every query and every offset from the start of the text to one past
//! its end, the located node must surround the offset, and nothing may be
//! found outside the root expression.

use std::sync::Arc;

use promql_lsp::cache::locate::smallest_surrounding_node;
use promql_syntax::{parse, Expr, ExprKind, Span};

// ============================================================================
// Corpus
// ============================================================================

const QUERIES: &[&str] = &[
    "1",
    " 1",
    "-1",
    "+Inf",
    "-Inf",
    ".5",
    "5.",
    "123.4567",
    "5e-3",
    "5e3",
    "0xc",
    "0755",
    "+5.5e-3",
    "-0755",
    "1 + 1",
    "1 - 1",
    "1 * 1",
    "1 % 1",
    "1 / 1",
    "1 == bool 1",
    "1 != bool 1",
    "1 > bool 1",
    "1 >= bool 1",
    "1 < bool 1",
    "1 <= bool 1",
    "+1 + -2 * 1",
    "1 + 2/(3*1)",
    "1 < bool 2 - 1 * 2",
    "-some_metric",
    "+some_metric",
    "",
    "# just a comment\n\n",
    "1+",
    ".",
    "2.5.",
    "100..4",
    "0deadbeef",
    "1 /",
    "*1",
    "(1))",
    "((1)",
    "999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999",
    "(",
    "1 and 1",
    "1 == 1",
    "1 or 1",
    "1 unless 1",
    "1 !~ 1",
    "1 =~ 1",
    r#"-"string""#,
    "-test[5m]",
    "*test",
    "1 offset 1d",
    "a - on(b) ignoring(c) d",
    "foo * bar",
    "foo == 1",
    "foo == bool 1",
    "2.5 / bar",
    "foo and bar",
    "foo unless bar",
    "foo + bar or bla and blub",
    "foo and bar unless baz or qux",
    "bar + on(foo) bla / on(baz, buz) group_right(test) blub",
    "foo * on(test,blub) bar",
    "foo * on(test,blub) group_left bar",
    "foo and on(test,blub) bar",
    "foo and on() bar",
    "foo and ignoring(test,blub) bar",
    "foo and ignoring() bar",
    "foo unless on(bar) baz",
    "foo / on(test,blub) group_left(bar) bar",
    "foo / ignoring(test,blub) group_left(blub) bar",
    "foo - on(test,blub) group_right(bar,foo) bar",
    "foo - ignoring(test,blub) group_right(bar,foo) bar",
    "foo and 1",
    "1 and foo",
    "foo or 1",
    "1 or foo",
    "foo unless 1",
    "1 unless foo",
    "1 or on(bar) foo",
    "foo == on(bar) 10",
    "foo and on(bar) group_left(baz) bar",
    "foo and on(bar) group_right(baz) bar",
    "foo or on(bar) group_left(baz) bar",
    "foo or on(bar) group_right(baz) bar",
    "foo unless on(bar) group_left(baz) bar",
    "foo unless on(bar) group_right(baz) bar",
    r#"http_requests{group="production"} + on(instance) group_left(job,instance) cpu_count{type="smp"}"#,
    "foo + bool bar",
    "foo + bool 10",
    "foo and bool 10",
    "foo",
    "foo offset 5m",
    r#"foo:bar{a="bc"}"#,
    "foo{NaN='bc'}",
    r#"foo{a="b", foo!="bar", test=~"test", bar!~"baz"}"#,
    "{",
    "}",
    "some{",
    "some}",
    "some_metric{a=b}",
    r#"some_metric{a:b="b"}"#,
    r#"foo{a*"b"}"#,
    r#"foo{a>="b"}"#,
    r#"some_metric{a="\xff"}"#,
    "foo{gibberish}",
    "foo{1}",
    "{}",
    r#"{x=""}"#,
    r#"{x=~".*"}"#,
    r#"{x!~".+"}"#,
    r#"{x!="a"}"#,
    r#"foo{__name__="bar"}"#,
    "test[5s]",
    "test[5m]",
    "test[5h] OFFSET 5m",
    "test[5d] OFFSET 10s",
    "test[5w] offset 2w",
    r#"test{a="b"}[5y] OFFSET 3d"#,
    "foo[5mm]",
    "foo[0m]",
    "foo[5m30s]",
    "foo[5m] OFFSET 1h30m",
    r#"foo["5m"]"#,
    "foo[]",
    "foo[1]",
    "some_metric[5m] OFFSET 1",
    "some_metric[5m] OFFSET 1mm",
    "some_metric[5m] OFFSET",
    "some_metric OFFSET 1m[5m]",
    "(foo + bar)[5m]",
    "sum by (foo)(some_metric)",
    "avg by (foo)(some_metric)",
    "max by (foo)(some_metric)",
    "sum without (foo) (some_metric)",
    "sum (some_metric) without (foo)",
    "stddev(some_metric)",
    "stdvar by (foo)(some_metric)",
    "sum by ()(some_metric)",
    "topk(5, some_metric)",
    r#"count_values("value", some_metric)"#,
    "sum without(and, by, avg, count, alert, annotations)(some_metric)",
    "sum without(==)(some_metric)",
    "sum some_metric by (test)",
    "sum (some_metric) by test",
    "sum (some_metric) by test",
    "sum () by (test)",
    "MIN keep_common (some_metric)",
    "MIN (some_metric) keep_common",
    "sum (some_metric) without (test) by (test)",
    "sum without (test) (some_metric) by (test)",
    "topk(some_metric)",
    "topk(some_metric, other_metric)",
    "count_values(5, other_metric)",
    "time()",
    r#"floor(some_metric{foo!="bar"})"#,
    "rate(some_metric[5m])",
    "round(some_metric)",
    "round(some_metric, 5)",
    "floor()",
    "floor(some_metric, other_metric)",
    "floor(1)",
    "non_existent_function_far_bar()",
    "rate(some_metric)",
    r#"label_replace(a, `b`, `c\xff`, `d`, `.*`)"#,
    "-=",
    "++-++-+-+-<",
    "e-+=/(0)",
    r#""double-quoted string \" with escaped quote""#,
    r#"'single-quoted string \' with escaped quote'"#,
    "`backtick-quoted string`",
    r#""\a\b\f\n\r\t\v\\\" - \xFF\377\u1234\U00010111\U0001011111☺""#,
    r#"'\a\b\f\n\r\t\v\\\' - \xFF\377\u1234\U00010111\U0001011111☺'"#,
    r#"`\a\b\f\n\r\t\v\\\"\' - \xFF\377\u1234\U00010111\U0001011111☺`"#,
    r#"`\``"#,
    r#""\"#,
    r#""\c""#,
    r#""\x.""#,
    r#"foo{bar="baz"}[10m:6s]"#,
    "foo[10m:]",
    r#"min_over_time(rate(foo{bar="baz"}[2s])[5m:5s])"#,
    r#"min_over_time(rate(foo{bar="baz"}[2s])[5m:])[4m:3s]"#,
    r#"min_over_time(rate(foo{bar="baz"}[2s])[5m:] offset 4m)[4m:3s]"#,
    "sum without(and, by, avg, count, alert, annotations)(some_metric) [30m:10s]",
    "some_metric OFFSET 1m [10m:5s]",
    r#"(foo + bar{nm="val"})[5m:]"#,
    r#"(foo + bar{nm="val"})[5m:] offset 10m"#,
    "test[5d] OFFSET 10s [10m:5s]",
    r#"(foo + bar{nm="val"})[5m:][10m:5s]"#,
    "{} 1 2 3",
    r#"{a="b"} -1 2 3"#,
    "my_metric 1 2 3",
    "my_metric{} 1 2 3",
    r#"my_metric{a="b"} 1 2 3"#,
    r#"my_metric{a="b"} 1 2 3-10x4"#,
    r#"my_metric{a="b"} 1 2 3-0x4"#,
    r#"my_metric{a="b"} 1 3 _ 5 _x4"#,
    r#"my_metric{a="b"} 1 3 _ 5 _a4"#,
    r#"my_metric{a="b"} 1 -1"#,
    r#"my_metric{a="b"} 1 +1"#,
    r#"my_metric{a="b"} 1 -1 -3-10x4 7 9 +5"#,
    r#"my_metric{a="b"} 1 +1 +4 -6 -2 8"#,
    r#"my_metric{a="b"} 1 2 3    "#,
    r#"my_metric{a="b"} -3-3 -3"#,
    r#"my_metric{a="b"} -3 -3-3"#,
    r#"my_metric{a="b"} -3 _-2"#,
    r#"my_metric{a="b"} -3 3+3x4-4"#,
];

// ============================================================================
// Helper Functions
// ============================================================================

fn check_query(source: &str) {
    let result = parse(source);
    let root = result.root.as_ref();

    for pos in 0..=source.len() + 1 {
        let node = smallest_surrounding_node(root, pos);

        let Some(root) = root.filter(|r| r.span().contains(pos)) else {
            assert!(
                node.is_none(),
                "nothing should match at {pos} in {source:?}, got {:?}",
                node.map(|n| n.span())
            );
            continue;
        };

        let node = node.unwrap_or_else(|| panic!("no node at {pos} in {source:?}"));
        assert!(
            node.span().contains(pos),
            "{:?} does not surround {pos} in {source:?}",
            node.span()
        );
        assert!(root.span().covers(&node.span()));
        assert!(
            node.children().iter().all(|c| !c.span().contains(pos)),
            "a child of {:?} also surrounds {pos} in {source:?}",
            node.span()
        );
    }
}

fn root_of(source: &str) -> Arc<Expr> {
    parse(source)
        .root
        .unwrap_or_else(|| panic!("no tree for {source:?}"))
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_every_offset_of_corpus() {
    for source in QUERIES {
        check_query(source);
    }
}

#[test]
fn test_whole_expression_matches() {
    for (source, pos) in [("1", 0), ("1", 1), ("+1 + -2 * 1", 4)] {
        let root = root_of(source);
        let node = smallest_surrounding_node(Some(&root), pos).unwrap();
        assert!(Arc::ptr_eq(node, &root), "{source:?} at {pos}");
    }
}

#[test]
fn test_no_tree_inputs() {
    for source in ["", "# just a comment\n\n", "(", "((1)", "*1", "-="] {
        let result = parse(source);
        for pos in 0..=source.len() + 1 {
            assert!(smallest_surrounding_node(result.root.as_ref(), pos).is_none());
        }
    }
}

#[test]
fn test_trailing_paren_keeps_partial_tree() {
    let root = root_of("(1))");
    assert_eq!(root.span(), Span::new(0, 3));
    assert_eq!(
        smallest_surrounding_node(Some(&root), 3).map(|n| n.kind()),
        Some(ExprKind::Paren)
    );
    assert!(smallest_surrounding_node(Some(&root), 4).is_none());
}

#[test]
fn test_leading_whitespace_is_outside() {
    let root = root_of(" 1");
    assert!(smallest_surrounding_node(Some(&root), 0).is_none());
    assert_eq!(
        smallest_surrounding_node(Some(&root), 1).map(|n| n.span()),
        Some(Span::new(1, 2))
    );
}
