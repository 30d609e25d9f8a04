//! PromQL abstract syntax tree.
//!
//! Every node carries the [`Span`] of the source text it was parsed from.
//! Children are shared through [`Arc`] so that subtrees handed out by a
//! lookup stay valid after the owning document has been superseded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::functions;
use crate::Span;

/// A PromQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal, sign included when one was written directly before it.
    NumberLiteral(NumberLiteral),
    /// String literal.
    StringLiteral(StringLiteral),
    /// Unary `+`/`-` applied to a non-literal operand.
    Unary(UnaryExpr),
    /// Binary operation.
    Binary(BinaryExpr),
    /// Parenthesized expression.
    Paren(ParenExpr),
    /// Function call.
    Call(Call),
    /// Aggregation such as `sum by (job) (x)`.
    Aggregate(AggregateExpr),
    /// Instant vector selector.
    VectorSelector(VectorSelector),
    /// Range vector selector (`x[5m]`).
    MatrixSelector(MatrixSelector),
    /// Subquery (`expr[1h:5m]`).
    Subquery(SubqueryExpr),
    /// Offset modifier (`expr offset 5m`).
    Offset(OffsetExpr),
}

/// A number literal.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    /// The literal value.
    pub value: f64,
    /// Source span.
    pub span: Span,
}

/// A string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    /// The unescaped string contents.
    pub value: String,
    /// Source span, quotes included.
    pub span: Span,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    /// The operator.
    pub op: UnaryOp,
    /// The operand.
    pub expr: Arc<Expr>,
    /// Source span, operator included.
    pub span: Span,
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    /// The operator.
    pub op: BinaryOp,
    /// Left operand.
    pub lhs: Arc<Expr>,
    /// Right operand.
    pub rhs: Arc<Expr>,
    /// Whether the `bool` modifier was given.
    pub return_bool: bool,
    /// `on`/`ignoring` and `group_left`/`group_right` modifiers.
    pub matching: Option<VectorMatching>,
    /// Source span.
    pub span: Span,
}

/// A parenthesized expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ParenExpr {
    /// The inner expression.
    pub expr: Arc<Expr>,
    /// Source span, parentheses included.
    pub span: Span,
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Function name as written.
    pub name: String,
    /// Arguments in source order.
    pub args: Vec<Arc<Expr>>,
    /// Source span.
    pub span: Span,
}

/// An aggregation.
///
/// Arguments are kept as written; for operators that take a parameter
/// (`topk`, `quantile`, ...) the first argument is the parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    /// The aggregation operator.
    pub op: AggregateOp,
    /// Arguments in source order.
    pub args: Vec<Arc<Expr>>,
    /// `by`/`without` clause.
    pub grouping: Option<Grouping>,
    /// Source span.
    pub span: Span,
}

impl AggregateExpr {
    /// The parameter argument, for operators that take one.
    pub fn param(&self) -> Option<&Arc<Expr>> {
        if self.op.param_type().is_some() && self.args.len() > 1 {
            self.args.first()
        } else {
            None
        }
    }

    /// The aggregated expression.
    pub fn expr(&self) -> Option<&Arc<Expr>> {
        self.args.last()
    }
}

/// An instant vector selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSelector {
    /// Metric name written before the braces, if any.
    pub name: Option<String>,
    /// Label matchers inside the braces.
    pub matchers: Vec<LabelMatcher>,
    /// Source span.
    pub span: Span,
}

/// A range vector selector.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSelector {
    /// The selected expression, normally a vector selector.
    pub selector: Arc<Expr>,
    /// Range duration.
    pub range: Duration,
    /// Source span, brackets included.
    pub span: Span,
}

/// A subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpr {
    /// The inner expression.
    pub expr: Arc<Expr>,
    /// Range duration.
    pub range: Duration,
    /// Resolution step, if given.
    pub step: Option<Duration>,
    /// Source span, brackets included.
    pub span: Span,
}

/// An offset modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetExpr {
    /// The modified expression.
    pub expr: Arc<Expr>,
    /// Offset magnitude.
    pub offset: Duration,
    /// Whether the offset points forward in time (`offset -5m`).
    pub negative: bool,
    /// Source span.
    pub span: Span,
}

/// A label matcher inside a vector selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    /// Label name.
    pub name: String,
    /// Match operator.
    pub op: MatchOp,
    /// Value to match against.
    pub value: String,
    /// Source span.
    pub span: Span,
}

impl LabelMatcher {
    /// Whether this matcher accepts the empty label value.
    ///
    /// Regex matchers that fail to compile are treated as matching.
    pub fn matches_empty(&self) -> bool {
        match self.op {
            MatchOp::Equal => self.value.is_empty(),
            MatchOp::NotEqual => !self.value.is_empty(),
            MatchOp::RegexMatch => anchored_regex(&self.value).map_or(true, |re| re.is_match("")),
            MatchOp::RegexNoMatch => {
                anchored_regex(&self.value).map_or(true, |re| !re.is_match(""))
            }
        }
    }
}

/// Compile a label-matcher regex the way Prometheus anchors it.
pub fn anchored_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
    regex::Regex::new(&format!("^(?s:{pattern})$"))
}

/// Label match operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    RegexMatch,
    /// `!~`
    RegexNoMatch,
}

impl MatchOp {
    /// The operator as written in source.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::RegexMatch => "=~",
            Self::RegexNoMatch => "!~",
        }
    }
}

/// `by (...)` or `without (...)` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    /// True for `without`.
    pub without: bool,
    /// Label names.
    pub labels: Vec<String>,
}

/// Vector matching modifiers of a binary expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VectorMatching {
    /// `on(...)` (true) or `ignoring(...)` (false) with its labels.
    pub on: Option<(bool, Vec<String>)>,
    /// `group_left`/`group_right` with its extra labels.
    pub group: Option<GroupModifier>,
}

/// `group_left(...)` or `group_right(...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupModifier {
    /// Which side may have many matches.
    pub side: GroupSide,
    /// Labels to copy from the "one" side.
    pub labels: Vec<String>,
}

/// Side of a group modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSide {
    /// `group_left`
    Left,
    /// `group_right`
    Right,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
}

impl UnaryOp {
    /// The operator as written in source.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `^`
    Pow,
    /// `atan2`
    Atan2,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `and`
    And,
    /// `or`
    Or,
    /// `unless`
    Unless,
}

impl BinaryOp {
    /// The operator as written in source.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "^",
            Self::Atan2 => "atan2",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::And => "and",
            Self::Or => "or",
            Self::Unless => "unless",
        }
    }

    /// Whether this is a comparison operator.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Lt | Self::Ge | Self::Le
        )
    }

    /// Whether this is one of `and`, `or`, `unless`.
    pub const fn is_set_operator(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Unless)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// `sum`
    Sum,
    /// `avg`
    Avg,
    /// `count`
    Count,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `group`
    Group,
    /// `stddev`
    Stddev,
    /// `stdvar`
    Stdvar,
    /// `topk`
    Topk,
    /// `bottomk`
    Bottomk,
    /// `count_values`
    CountValues,
    /// `quantile`
    Quantile,
    /// `limitk`
    Limitk,
    /// `limit_ratio`
    LimitRatio,
}

impl AggregateOp {
    /// All aggregation operators.
    pub const ALL: [Self; 14] = [
        Self::Sum,
        Self::Avg,
        Self::Count,
        Self::Min,
        Self::Max,
        Self::Group,
        Self::Stddev,
        Self::Stdvar,
        Self::Topk,
        Self::Bottomk,
        Self::CountValues,
        Self::Quantile,
        Self::Limitk,
        Self::LimitRatio,
    ];

    /// Look up an operator by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// The operator name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Group => "group",
            Self::Stddev => "stddev",
            Self::Stdvar => "stdvar",
            Self::Topk => "topk",
            Self::Bottomk => "bottomk",
            Self::CountValues => "count_values",
            Self::Quantile => "quantile",
            Self::Limitk => "limitk",
            Self::LimitRatio => "limit_ratio",
        }
    }

    /// Type of the leading parameter, for operators that take one.
    pub const fn param_type(self) -> Option<ValueType> {
        match self {
            Self::Topk | Self::Bottomk | Self::Quantile | Self::Limitk | Self::LimitRatio => {
                Some(ValueType::Scalar)
            }
            Self::CountValues => Some(ValueType::String),
            _ => None,
        }
    }
}

/// The type a PromQL expression evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// A single number.
    Scalar,
    /// A set of series with one sample each.
    Vector,
    /// A set of series with a range of samples each.
    Matrix,
    /// A string.
    String,
}

impl ValueType {
    /// Human-readable name as used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Vector => "instant vector",
            Self::Matrix => "range vector",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discriminator for [`Expr`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// [`Expr::NumberLiteral`]
    NumberLiteral,
    /// [`Expr::StringLiteral`]
    StringLiteral,
    /// [`Expr::Unary`]
    Unary,
    /// [`Expr::Binary`]
    Binary,
    /// [`Expr::Paren`]
    Paren,
    /// [`Expr::Call`]
    Call,
    /// [`Expr::Aggregate`]
    Aggregate,
    /// [`Expr::VectorSelector`]
    VectorSelector,
    /// [`Expr::MatrixSelector`]
    MatrixSelector,
    /// [`Expr::Subquery`]
    Subquery,
    /// [`Expr::Offset`]
    Offset,
}

impl ExprKind {
    /// Display name of the node kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NumberLiteral => "number literal",
            Self::StringLiteral => "string literal",
            Self::Unary => "unary expression",
            Self::Binary => "binary expression",
            Self::Paren => "parenthesized expression",
            Self::Call => "function call",
            Self::Aggregate => "aggregation",
            Self::VectorSelector => "vector selector",
            Self::MatrixSelector => "matrix selector",
            Self::Subquery => "subquery",
            Self::Offset => "offset expression",
        }
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Expr {
    /// Create a number literal.
    pub const fn number(value: f64, span: Span) -> Self {
        Self::NumberLiteral(NumberLiteral { value, span })
    }

    /// Create a string literal.
    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::StringLiteral(StringLiteral {
            value: value.into(),
            span,
        })
    }

    /// Apply a unary operator.
    ///
    /// A sign written directly before a number literal is folded into the
    /// literal, whose span then starts at the sign.
    pub fn unary(op: UnaryOp, operand: Self, span: Span) -> Self {
        match operand {
            Self::NumberLiteral(lit) => {
                let value = match op {
                    UnaryOp::Plus => lit.value,
                    UnaryOp::Minus => -lit.value,
                };
                Self::number(value, span)
            }
            operand => Self::Unary(UnaryExpr {
                op,
                expr: Arc::new(operand),
                span,
            }),
        }
    }

    /// Create a binary expression spanning both operands.
    pub fn binary(lhs: Self, op: BinaryOp, modifiers: BinModifiers, rhs: Self) -> Self {
        let span = lhs.span().merge(&rhs.span());
        Self::Binary(BinaryExpr {
            op,
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
            return_bool: modifiers.return_bool,
            matching: modifiers.matching,
            span,
        })
    }

    /// Wrap an expression in parentheses.
    pub fn paren(inner: Self, span: Span) -> Self {
        Self::Paren(ParenExpr {
            expr: Arc::new(inner),
            span,
        })
    }

    /// Create a function call.
    pub fn call(name: impl Into<String>, args: Vec<Self>, span: Span) -> Self {
        Self::Call(Call {
            name: name.into(),
            args: args.into_iter().map(Arc::new).collect(),
            span,
        })
    }

    /// Get the span of this node.
    pub const fn span(&self) -> Span {
        match self {
            Self::NumberLiteral(e) => e.span,
            Self::StringLiteral(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Paren(e) => e.span,
            Self::Call(e) => e.span,
            Self::Aggregate(e) => e.span,
            Self::VectorSelector(e) => e.span,
            Self::MatrixSelector(e) => e.span,
            Self::Subquery(e) => e.span,
            Self::Offset(e) => e.span,
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Arc<Self>> {
        match self {
            Self::NumberLiteral(_) | Self::StringLiteral(_) | Self::VectorSelector(_) => Vec::new(),
            Self::Unary(e) => vec![&e.expr],
            Self::Binary(e) => vec![&e.lhs, &e.rhs],
            Self::Paren(e) => vec![&e.expr],
            Self::Call(e) => e.args.iter().collect(),
            Self::Aggregate(e) => e.args.iter().collect(),
            Self::MatrixSelector(e) => vec![&e.selector],
            Self::Subquery(e) => vec![&e.expr],
            Self::Offset(e) => vec![&e.expr],
        }
    }

    /// The variant of this node.
    pub const fn kind(&self) -> ExprKind {
        match self {
            Self::NumberLiteral(_) => ExprKind::NumberLiteral,
            Self::StringLiteral(_) => ExprKind::StringLiteral,
            Self::Unary(_) => ExprKind::Unary,
            Self::Binary(_) => ExprKind::Binary,
            Self::Paren(_) => ExprKind::Paren,
            Self::Call(_) => ExprKind::Call,
            Self::Aggregate(_) => ExprKind::Aggregate,
            Self::VectorSelector(_) => ExprKind::VectorSelector,
            Self::MatrixSelector(_) => ExprKind::MatrixSelector,
            Self::Subquery(_) => ExprKind::Subquery,
            Self::Offset(_) => ExprKind::Offset,
        }
    }

    /// The type this expression evaluates to.
    ///
    /// Calls to unknown functions are assumed to return an instant vector.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::NumberLiteral(_) => ValueType::Scalar,
            Self::StringLiteral(_) => ValueType::String,
            Self::Unary(e) => e.expr.value_type(),
            Self::Binary(e) => {
                if e.lhs.value_type() == ValueType::Scalar
                    && e.rhs.value_type() == ValueType::Scalar
                {
                    ValueType::Scalar
                } else {
                    ValueType::Vector
                }
            }
            Self::Paren(e) => e.expr.value_type(),
            Self::Call(e) => {
                functions::function(&e.name).map_or(ValueType::Vector, |f| f.return_type)
            }
            Self::Aggregate(_) | Self::VectorSelector(_) => ValueType::Vector,
            Self::MatrixSelector(_) | Self::Subquery(_) => ValueType::Matrix,
            Self::Offset(e) => e.expr.value_type(),
        }
    }
}

/// Modifiers that may follow a binary operator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinModifiers {
    /// `bool` was given.
    pub return_bool: bool,
    /// `on`/`ignoring`/`group_*` clauses.
    pub matching: Option<VectorMatching>,
}

/// Format a duration the way PromQL writes it (`1h30m`, `500ms`).
pub fn format_duration(duration: Duration) -> String {
    const UNITS: [(&str, u128); 7] = [
        ("y", 365 * 24 * 60 * 60 * 1000),
        ("w", 7 * 24 * 60 * 60 * 1000),
        ("d", 24 * 60 * 60 * 1000),
        ("h", 60 * 60 * 1000),
        ("m", 60 * 1000),
        ("s", 1000),
        ("ms", 1),
    ];

    let mut ms = duration.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, size) in UNITS {
        if ms >= size {
            out.push_str(&format!("{}{unit}", ms / size));
            ms %= size;
        }
    }
    out
}
