//! PromQL parser implementation.
//!
//! Uses chumsky for parser combinators, working directly on the source
//! characters so that every node records the byte range it came from.

use std::sync::Arc;
use std::time::Duration;

use chumsky::error::RichReason;
use chumsky::prelude::*;

use crate::ast::{
    AggregateExpr, AggregateOp, BinModifiers, BinaryOp, Expr, GroupModifier, GroupSide, Grouping,
    LabelMatcher, MatchOp, MatrixSelector, OffsetExpr, SubqueryExpr, UnaryOp, VectorMatching,
    VectorSelector,
};
use crate::error::{ParseError, ParseErrorKind};
use crate::functions;
use crate::Span;

type ParserInput<'a> = &'a str;
type ParserExtra<'a> = extra::Err<Rich<'a, char>>;

/// Convert a `SimpleSpan` to our Span type.
const fn to_span(s: SimpleSpan) -> Span {
    Span::new(s.start, s.end)
}

/// Parse PromQL source text.
///
/// Returns the expression tree, if any, together with the syntax errors.
/// When the input is not a single well-formed expression the longest valid
/// leading expression is returned as a partial tree.
pub fn parse(source: &str) -> (Option<Expr>, Vec<ParseError>) {
    let (_, blank_errs) = ws().then_ignore(end()).parse(source).into_output_errors();
    if blank_errs.is_empty() {
        let err = ParseError::new(ParseErrorKind::EmptyInput, Span::new(0, source.len()));
        return (None, vec![err]);
    }

    if let Some(err) = nesting_error(source) {
        return (None, vec![err]);
    }

    let (root, errs) = ws()
        .ignore_then(expr())
        .then_ignore(ws())
        .then_ignore(end())
        .parse(source)
        .into_output_errors();

    if let Some(root) = root {
        if errs.is_empty() {
            return (Some(root), Vec::new());
        }
    }

    let mut errors: Vec<ParseError> = errs.iter().map(|e| convert_error(e, source)).collect();
    if errors.is_empty() {
        let end = source.trim_end().len();
        errors.push(ParseError::new(
            ParseErrorKind::SyntaxError("unexpected trailing input".to_string()),
            Span::new(end, source.len()),
        ));
    }

    let (partial, _) = ws()
        .ignore_then(expr())
        .then_ignore(any().repeated())
        .parse(source)
        .into_output_errors();

    (partial, errors)
}

/// Deepest bracket nesting the recursive grammar accepts.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Reject input nested deeper than [`MAX_NESTING_DEPTH`] before the grammar
/// recurses into it.
///
/// Brackets inside strings and comments are skipped.
fn nesting_error(source: &str) -> Option<ParseError> {
    let mut depth = 0usize;
    let mut chars = source.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '#' => {
                chars.by_ref().find(|&(_, c)| c == '\n');
            }
            '"' | '\'' | '`' => {
                let mut escaped = false;
                for (_, next) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if next == '\\' && c != '`' {
                        escaped = true;
                    } else if next == c {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    return Some(ParseError::new(
                        ParseErrorKind::Custom(format!(
                            "expression nesting exceeds {MAX_NESTING_DEPTH} levels"
                        )),
                        Span::new(i, i + 1),
                    ));
                }
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Errors are only reported as end of input when nothing but whitespace
/// follows their position.
fn convert_error(err: &Rich<'_, char>, source: &str) -> ParseError {
    let span = to_span(*err.span());
    let at_end = span.start >= source.trim_end().len();
    let kind = match err.reason() {
        RichReason::Custom(msg) => ParseErrorKind::Custom(msg.to_string()),
        _ if at_end => ParseErrorKind::UnexpectedEof,
        _ => ParseErrorKind::SyntaxError(err.to_string()),
    };
    ParseError::new(kind, span)
}

/// Whitespace and `#` comments.
fn ws<'a>() -> impl Parser<'a, ParserInput<'a>, (), ParserExtra<'a>> + Clone {
    let comment = just('#').then(none_of("\r\n").repeated()).ignored();
    one_of(" \t\r\n").ignored().or(comment).repeated().ignored()
}

/// Parse digits.
fn digits<'a>() -> impl Parser<'a, ParserInput<'a>, &'a str, ParserExtra<'a>> + Clone {
    one_of("0123456789").repeated().at_least(1).to_slice()
}

/// Label names: `[a-zA-Z_][a-zA-Z0-9_]*`.
fn label_name<'a>() -> impl Parser<'a, ParserInput<'a>, &'a str, ParserExtra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
}

/// Metric names may also contain colons.
fn metric_name<'a>() -> impl Parser<'a, ParserInput<'a>, &'a str, ParserExtra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_' || *c == ':')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == ':')
                .repeated(),
        )
        .to_slice()
}

/// Case-insensitive keyword, matched against a whole identifier.
fn kw<'a>(keyword: &'static str) -> impl Parser<'a, ParserInput<'a>, (), ParserExtra<'a>> + Clone {
    label_name()
        .filter(move |s: &&str| s.eq_ignore_ascii_case(keyword))
        .ignored()
}

/// Comma separated list with optional trailing comma, between delimiters.
fn list<'a, T, P>(
    open: char,
    item: P,
    close: char,
) -> impl Parser<'a, ParserInput<'a>, Vec<T>, ParserExtra<'a>> + Clone
where
    P: Parser<'a, ParserInput<'a>, T, ParserExtra<'a>> + Clone,
{
    just(open)
        .ignore_then(ws())
        .ignore_then(
            item.separated_by(ws().then(just(',')).then(ws()))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(ws())
        .then_ignore(just(close))
}

/// `(label, label, ...)`
fn label_list<'a>() -> impl Parser<'a, ParserInput<'a>, Vec<String>, ParserExtra<'a>> + Clone {
    list('(', label_name().map(str::to_string), ')')
}

/// Parse an expression (with precedence climbing).
#[allow(clippy::large_stack_frames)]
fn expr<'a>() -> impl Parser<'a, ParserInput<'a>, Expr, ParserExtra<'a>> + Clone {
    recursive(|expr| {
        let postfixed = atom(expr)
            .foldl(postfix().repeated(), |inner, (op, end)| {
                apply_postfix(inner, op, end)
            })
            .boxed();

        // Unary signs bind looser than `^`, which is right associative.
        let unary = recursive(|unary| {
            let power = postfixed
                .then(
                    ws().ignore_then(just('^'))
                        .ignore_then(bin_modifiers())
                        .then_ignore(ws())
                        .then(unary)
                        .or_not(),
                )
                .map(|(lhs, rhs)| match rhs {
                    Some((modifiers, rhs)) => Expr::binary(lhs, BinaryOp::Pow, modifiers, rhs),
                    None => lhs,
                });

            choice((just('+').to(UnaryOp::Plus), just('-').to(UnaryOp::Minus)))
                .map_with(|op, e| {
                    let span: SimpleSpan = e.span();
                    (op, span.start)
                })
                .then_ignore(ws())
                .repeated()
                .foldr(power, |(op, start), operand| {
                    let span = Span::new(start, operand.span().end);
                    Expr::unary(op, operand, span)
                })
        })
        .boxed();

        let multiplicative = binary_level(
            unary,
            choice((
                just('*').to(BinaryOp::Mul),
                just('/').to(BinaryOp::Div),
                just('%').to(BinaryOp::Mod),
                kw("atan2").to(BinaryOp::Atan2),
            )),
        );

        let additive = binary_level(
            multiplicative,
            choice((just('+').to(BinaryOp::Add), just('-').to(BinaryOp::Sub))),
        );

        let comparison = binary_level(additive, comparison_op());

        let and_unless = binary_level(
            comparison,
            choice((
                kw("and").to(BinaryOp::And),
                kw("unless").to(BinaryOp::Unless),
            )),
        );

        // OR (lowest precedence)
        binary_level(and_unless, kw("or").to(BinaryOp::Or))
    })
}

/// One left-associative precedence level.
fn binary_level<'a, P, O>(operand: P, op: O) -> Boxed<'a, 'a, ParserInput<'a>, Expr, ParserExtra<'a>>
where
    P: Parser<'a, ParserInput<'a>, Expr, ParserExtra<'a>> + Clone + 'a,
    O: Parser<'a, ParserInput<'a>, BinaryOp, ParserExtra<'a>> + Clone + 'a,
{
    operand
        .clone()
        .foldl(
            ws().ignore_then(op)
                .then(bin_modifiers())
                .then_ignore(ws())
                .then(operand)
                .repeated(),
            |lhs, ((op, modifiers), rhs)| Expr::binary(lhs, op, modifiers, rhs),
        )
        .boxed()
}

/// Parse comparison operators.
fn comparison_op<'a>() -> impl Parser<'a, ParserInput<'a>, BinaryOp, ParserExtra<'a>> + Clone {
    choice((
        just("==").to(BinaryOp::Eq),
        just("!=").to(BinaryOp::Ne),
        just(">=").to(BinaryOp::Ge),
        just("<=").to(BinaryOp::Le),
        just('>').to(BinaryOp::Gt),
        just('<').to(BinaryOp::Lt),
    ))
}

/// `bool`, `on(...)`/`ignoring(...)` and `group_left(...)`/`group_right(...)`.
fn bin_modifiers<'a>() -> impl Parser<'a, ParserInput<'a>, BinModifiers, ParserExtra<'a>> + Clone
{
    let return_bool = ws().ignore_then(kw("bool")).or_not().map(|b| b.is_some());

    let group = ws()
        .ignore_then(choice((
            kw("group_left").to(GroupSide::Left),
            kw("group_right").to(GroupSide::Right),
        )))
        .then(ws().ignore_then(label_list()).or_not())
        .map(|(side, labels)| GroupModifier {
            side,
            labels: labels.unwrap_or_default(),
        });

    let matching = ws()
        .ignore_then(choice((kw("on").to(true), kw("ignoring").to(false))))
        .then_ignore(ws())
        .then(label_list())
        .then(group.or_not())
        .map(|(on, group)| VectorMatching {
            on: Some(on),
            group,
        });

    return_bool
        .then(matching.or_not())
        .map(|(return_bool, matching)| BinModifiers {
            return_bool,
            matching,
        })
}

/// Postfix operators, applied left to right.
#[derive(Debug, Clone)]
enum Postfix {
    Range(Duration),
    Subquery(Duration, Option<Duration>),
    Offset(Duration, bool),
}

/// A postfix operator paired with the offset where it ends.
fn postfix<'a>() -> impl Parser<'a, ParserInput<'a>, (Postfix, usize), ParserExtra<'a>> + Clone {
    let brackets = just('[')
        .ignore_then(ws())
        .ignore_then(duration())
        .then_ignore(ws())
        .then(
            just(':')
                .ignore_then(ws())
                .ignore_then(duration().or_not())
                .then_ignore(ws())
                .or_not(),
        )
        .then_ignore(just(']'))
        .map(|(range, step)| match step {
            Some(step) => Postfix::Subquery(range, step),
            None => Postfix::Range(range),
        });

    let offset = kw("offset")
        .ignore_then(ws())
        .ignore_then(just('-').then_ignore(ws()).or_not())
        .then(duration())
        .map(|(neg, offset)| Postfix::Offset(offset, neg.is_some()));

    ws().ignore_then(choice((brackets, offset)))
        .map_with(|op, e| {
            let span: SimpleSpan = e.span();
            (op, span.end)
        })
}

fn apply_postfix(inner: Expr, op: Postfix, end: usize) -> Expr {
    let span = Span::new(inner.span().start, end);
    let inner = Arc::new(inner);
    match op {
        Postfix::Range(range) => Expr::MatrixSelector(MatrixSelector {
            selector: inner,
            range,
            span,
        }),
        Postfix::Subquery(range, step) => Expr::Subquery(SubqueryExpr {
            expr: inner,
            range,
            step,
            span,
        }),
        Postfix::Offset(offset, negative) => Expr::Offset(OffsetExpr {
            expr: inner,
            offset,
            negative,
            span,
        }),
    }
}

/// Durations such as `5m`, `1h30m` or `250ms`.
fn duration<'a>() -> impl Parser<'a, ParserInput<'a>, Duration, ParserExtra<'a>> + Clone {
    let unit = choice((
        just("ms").to(1_u64),
        just('s').to(1_000),
        just('m').to(60_000),
        just('h').to(3_600_000),
        just('d').to(86_400_000),
        just('w').to(604_800_000),
        just('y').to(31_536_000_000),
    ));

    digits()
        .then(unit)
        .try_map(|(n, unit_ms): (&str, u64), span| {
            n.parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(unit_ms))
                .ok_or_else(|| Rich::custom(span, "duration out of range"))
        })
        .repeated()
        .at_least(1)
        .collect::<Vec<u64>>()
        .try_map(|parts, span| {
            parts
                .into_iter()
                .try_fold(0_u64, u64::checked_add)
                .map(Duration::from_millis)
                .ok_or_else(|| Rich::custom(span, "duration out of range"))
        })
}

/// Parse primary expressions.
fn atom<'a>(
    expr: impl Parser<'a, ParserInput<'a>, Expr, ParserExtra<'a>> + Clone + 'a,
) -> impl Parser<'a, ParserInput<'a>, Expr, ParserExtra<'a>> + Clone {
    let args = list('(', expr.clone(), ')');

    let paren = just('(')
        .ignore_then(ws())
        .ignore_then(expr)
        .then_ignore(ws())
        .then_ignore(just(')'))
        .map_with(|inner, e| Expr::paren(inner, to_span(e.span())));

    choice((
        number().map_with(|value, e| Expr::number(value, to_span(e.span()))),
        string_literal().map_with(|value, e| Expr::string(value, to_span(e.span()))),
        paren,
        aggregate(args.clone()),
        label_name()
            .filter(|name: &&str| !functions::is_reserved(name))
            .then_ignore(ws())
            .then(args)
            .map_with(|(name, args), e| Expr::call(name, args, to_span(e.span()))),
        vector_selector(),
    ))
}

/// `op [grouping] (args) [grouping]`
fn aggregate<'a>(
    args: impl Parser<'a, ParserInput<'a>, Vec<Expr>, ParserExtra<'a>> + Clone + 'a,
) -> impl Parser<'a, ParserInput<'a>, Expr, ParserExtra<'a>> + Clone {
    let grouping = choice((kw("by").to(false), kw("without").to(true)))
        .then_ignore(ws())
        .then(label_list())
        .map(|(without, labels)| Grouping { without, labels });

    label_name()
        .try_map(|name: &str, span| {
            AggregateOp::from_name(name)
                .ok_or_else(|| Rich::custom(span, format!("{name:?} is not an aggregation")))
        })
        .then_ignore(ws())
        .then(grouping.clone().then_ignore(ws()).or_not())
        .then(args)
        .then(ws().ignore_then(grouping).or_not())
        .try_map(|(((op, leading), args), trailing), span: SimpleSpan| {
            if leading.is_some() && trailing.is_some() {
                return Err(Rich::custom(
                    span,
                    "aggregation cannot have grouping both before and after its arguments",
                ));
            }
            Ok(Expr::Aggregate(AggregateExpr {
                op,
                args: args.into_iter().map(Arc::new).collect(),
                grouping: leading.or(trailing),
                span: to_span(span),
            }))
        })
}

/// `name`, `name{matchers}` or `{matchers}`.
fn vector_selector<'a>() -> impl Parser<'a, ParserInput<'a>, Expr, ParserExtra<'a>> + Clone {
    let match_op = choice((
        just("=~").to(MatchOp::RegexMatch),
        just("!~").to(MatchOp::RegexNoMatch),
        just("!=").to(MatchOp::NotEqual),
        just('=').to(MatchOp::Equal),
    ));

    let matcher = label_name()
        .then_ignore(ws())
        .then(match_op)
        .then_ignore(ws())
        .then(string_literal())
        .map_with(|((name, op), value), e| LabelMatcher {
            name: name.to_string(),
            op,
            value,
            span: to_span(e.span()),
        });

    let matchers = list('{', matcher, '}');

    let named = metric_name()
        .filter(|name: &&str| !functions::is_reserved(name))
        .then(ws().ignore_then(matchers.clone()).or_not())
        .map_with(|(name, matchers), e| {
            Expr::VectorSelector(VectorSelector {
                name: Some(name.to_string()),
                matchers: matchers.unwrap_or_default(),
                span: to_span(e.span()),
            })
        });

    let bare = matchers.map_with(|matchers, e| {
        Expr::VectorSelector(VectorSelector {
            name: None,
            matchers,
            span: to_span(e.span()),
        })
    });

    choice((named, bare))
}

/// Number literals: decimal, exponent, hex, octal, `Inf` and `NaN`.
fn number<'a>() -> impl Parser<'a, ParserInput<'a>, f64, ParserExtra<'a>> + Clone {
    let hex = just('0')
        .then(one_of("xX"))
        .ignore_then(
            any()
                .filter(char::is_ascii_hexdigit)
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .try_map(|digits: &str, span| {
            u64::from_str_radix(digits, 16)
                .map(|v| v as f64)
                .map_err(|_| Rich::custom(span, "invalid hexadecimal literal"))
        });

    let mantissa = digits()
        .then(just('.').then(digits().or_not()).or_not())
        .ignored()
        .or(just('.').then(digits()).ignored());
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(digits());

    let decimal = mantissa
        .then(exponent.or_not())
        .to_slice()
        .try_map(|text: &str, span| {
            parse_decimal(text).ok_or_else(|| Rich::custom(span, format!("invalid number {text:?}")))
        });

    let special = metric_name()
        .filter(|s: &&str| s.eq_ignore_ascii_case("inf") || s.eq_ignore_ascii_case("nan"))
        .map(|s: &str| {
            if s.eq_ignore_ascii_case("inf") {
                f64::INFINITY
            } else {
                f64::NAN
            }
        });

    choice((hex, decimal, special))
}

/// Integers with a leading zero are octal, as in Prometheus.
fn parse_decimal(text: &str) -> Option<f64> {
    let octal = text.len() > 1 && text.starts_with('0') && text.bytes().all(|b| b.is_ascii_digit());
    if octal {
        if let Ok(v) = u64::from_str_radix(text, 8) {
            return Some(v as f64);
        }
    }
    text.parse::<f64>().ok()
}

/// Parse a string literal: double or single quoted with escapes, or raw.
fn string_literal<'a>() -> impl Parser<'a, ParserInput<'a>, String, ParserExtra<'a>> + Clone {
    let hex_digit = any().filter(char::is_ascii_hexdigit);

    let escape = just('\\').ignore_then(choice((
        one_of("abfnrtv\\'\"").map(|c| match c {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0C',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0B',
            other => other,
        }),
        just('x')
            .ignore_then(hex_digit.clone().repeated().exactly(2).to_slice())
            .try_map(|digits: &str, span| code_point(digits, 16, span)),
        just('u')
            .ignore_then(hex_digit.clone().repeated().exactly(4).to_slice())
            .try_map(|digits: &str, span| code_point(digits, 16, span)),
        just('U')
            .ignore_then(hex_digit.repeated().exactly(8).to_slice())
            .try_map(|digits: &str, span| code_point(digits, 16, span)),
        one_of("01234567")
            .repeated()
            .exactly(3)
            .to_slice()
            .try_map(|digits: &str, span| code_point(digits, 8, span)),
    )));

    let double = just('"')
        .ignore_then(
            none_of("\"\\\n")
                .or(escape.clone())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'));

    let single = just('\'')
        .ignore_then(none_of("'\\\n").or(escape).repeated().collect::<String>())
        .then_ignore(just('\''));

    let raw = just('`')
        .ignore_then(none_of("`").repeated().to_slice())
        .then_ignore(just('`'))
        .map(str::to_string);

    choice((double, single, raw))
}

fn code_point<'a>(digits: &str, radix: u32, span: SimpleSpan) -> Result<char, Rich<'a, char>> {
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| Rich::custom(span, "invalid escape sequence"))
}
