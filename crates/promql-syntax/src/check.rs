//! Type checks for parsed expressions.
//!
//! The grammar accepts some expressions that Prometheus rejects, such as a
//! range selection on a function call or a comparison between two scalars
//! without `bool`. These are reported as semantic errors; the tree is kept.

use crate::ast::{
    anchored_regex, AggregateExpr, BinaryExpr, Call, Expr, MatchOp, ValueType, VectorSelector,
};
use crate::error::ParseError;
use crate::functions;

/// Check an expression tree, returning every semantic error found.
pub fn check(expr: &Expr) -> Vec<ParseError> {
    let mut checker = Checker::default();
    checker.visit(expr);
    checker.errors
}

#[derive(Default)]
struct Checker {
    errors: Vec<ParseError>,
}

impl Checker {
    fn report(&mut self, expr: &Expr, message: impl Into<String>) {
        self.errors.push(ParseError::semantic(message, expr.span()));
    }

    fn visit(&mut self, expr: &Expr) {
        match expr {
            Expr::NumberLiteral(_) | Expr::StringLiteral(_) | Expr::Paren(_) => {}
            Expr::Unary(unary) => {
                let ty = unary.expr.value_type();
                if !matches!(ty, ValueType::Scalar | ValueType::Vector) {
                    self.report(
                        expr,
                        format!(
                            "unary expression only allowed on expressions of type scalar or instant vector, got {ty}"
                        ),
                    );
                }
            }
            Expr::Binary(binary) => self.check_binary(expr, binary),
            Expr::Call(call) => self.check_call(expr, call),
            Expr::Aggregate(agg) => self.check_aggregate(expr, agg),
            Expr::VectorSelector(sel) => self.check_selector(expr, sel),
            Expr::MatrixSelector(matrix) => {
                if !matches!(matrix.selector.as_ref(), Expr::VectorSelector(_)) {
                    self.report(expr, "ranges only allowed for vector selectors");
                }
            }
            Expr::Subquery(sub) => {
                let ty = sub.expr.value_type();
                if ty != ValueType::Vector {
                    self.report(
                        expr,
                        format!("subquery is only allowed on instant vector, got {ty}"),
                    );
                }
            }
            Expr::Offset(offset) => match offset.expr.as_ref() {
                Expr::Offset(_) => self.report(expr, "offset may not be set multiple times"),
                Expr::MatrixSelector(m) if matches!(m.selector.as_ref(), Expr::Offset(_)) => {
                    self.report(expr, "offset may not be set multiple times");
                }
                Expr::VectorSelector(_) | Expr::MatrixSelector(_) | Expr::Subquery(_) => {}
                _ => self.report(
                    expr,
                    "offset modifier must be preceded by an instant vector selector or range vector selector or a subquery",
                ),
            },
        }

        for child in expr.children() {
            self.visit(child);
        }
    }

    fn check_binary(&mut self, expr: &Expr, binary: &BinaryExpr) {
        let lhs = binary.lhs.value_type();
        let rhs = binary.rhs.value_type();
        let op = binary.op;

        for ty in [lhs, rhs] {
            if !matches!(ty, ValueType::Scalar | ValueType::Vector) {
                self.report(
                    expr,
                    "binary expression must contain only scalar and instant vector types",
                );
                return;
            }
        }

        if binary.return_bool && !op.is_comparison() {
            self.report(
                expr,
                "bool modifier can only be used on comparison operators",
            );
        }

        let scalars = lhs == ValueType::Scalar && rhs == ValueType::Scalar;
        if op.is_comparison() && scalars && !binary.return_bool {
            self.report(expr, "comparisons between scalars must use BOOL modifier");
        }

        let any_scalar = lhs == ValueType::Scalar || rhs == ValueType::Scalar;
        if op.is_set_operator() && any_scalar {
            self.report(
                expr,
                format!("set operator {:?} not allowed in binary scalar expression", op.as_str()),
            );
        }

        if let Some(matching) = &binary.matching {
            if any_scalar {
                self.report(expr, "vector matching only allowed between instant vectors");
            }
            if let Some(group) = &matching.group {
                if op.is_set_operator() {
                    self.report(
                        expr,
                        format!("no grouping allowed for {:?} operation", op.as_str()),
                    );
                }
                if let Some((true, on_labels)) = &matching.on {
                    if let Some(label) = group.labels.iter().find(|l| on_labels.contains(l)) {
                        self.report(
                            expr,
                            format!("label {label:?} must not occur in ON and GROUP clause at once"),
                        );
                    }
                }
            }
        }
    }

    fn check_call(&mut self, expr: &Expr, call: &Call) {
        let Some(func) = functions::function(&call.name) else {
            self.report(expr, format!("unknown function with name {:?}", call.name));
            return;
        };

        let got = call.args.len();
        if got < func.min_args() {
            self.report(
                expr,
                format!(
                    "expected at least {} argument(s) in call to {:?}, got {got}",
                    func.min_args(),
                    func.name
                ),
            );
            return;
        }
        if let Some(max) = func.max_args() {
            if got > max {
                self.report(
                    expr,
                    format!(
                        "expected at most {max} argument(s) in call to {:?}, got {got}",
                        func.name
                    ),
                );
                return;
            }
        }

        for (idx, arg) in call.args.iter().enumerate() {
            let Some(expected) = func.arg_type(idx) else {
                continue;
            };
            let ty = arg.value_type();
            if ty != expected {
                self.report(
                    expr,
                    format!(
                        "expected type {expected} in call to function {:?}, got {ty}",
                        func.name
                    ),
                );
            }
        }
    }

    fn check_aggregate(&mut self, expr: &Expr, agg: &AggregateExpr) {
        let expected = if agg.op.param_type().is_some() { 2 } else { 1 };
        if agg.args.len() != expected {
            self.report(
                expr,
                format!(
                    "wrong number of arguments for aggregate expression provided, expected {expected}, got {}",
                    agg.args.len()
                ),
            );
            return;
        }

        if let (Some(param_type), Some(param)) = (agg.op.param_type(), agg.param()) {
            let ty = param.value_type();
            if ty != param_type {
                self.report(
                    expr,
                    format!("expected type {param_type} in aggregation parameter, got {ty}"),
                );
            }
        }

        if let Some(inner) = agg.expr() {
            let ty = inner.value_type();
            if ty != ValueType::Vector {
                self.report(
                    expr,
                    format!("expected type instant vector in aggregation expression, got {ty}"),
                );
            }
        }
    }

    fn check_selector(&mut self, expr: &Expr, sel: &VectorSelector) {
        for matcher in &sel.matchers {
            if matches!(matcher.op, MatchOp::RegexMatch | MatchOp::RegexNoMatch) {
                if let Err(err) = anchored_regex(&matcher.value) {
                    self.errors.push(ParseError::semantic(
                        format!("invalid regular expression in matcher: {err}"),
                        matcher.span,
                    ));
                }
            }
        }

        if let Some(name) = &sel.name {
            let renamed = sel
                .matchers
                .iter()
                .find(|m| m.name == "__name__" && m.op == MatchOp::Equal);
            if let Some(other) = renamed {
                self.report(
                    expr,
                    format!(
                        "metric name must not be set twice: {name:?} or {:?}",
                        other.value
                    ),
                );
            }
        } else if sel.matchers.iter().all(|m| m.matches_empty()) {
            self.report(
                expr,
                "vector selector must contain at least one non-empty matcher",
            );
        }
    }
}
