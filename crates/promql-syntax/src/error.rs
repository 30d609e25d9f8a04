//! Parse error types.

use crate::Span;
use thiserror::Error;

/// A parse error with location information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// The span where the error occurred.
    pub span: Span,
}

impl ParseError {
    /// Create a new parse error.
    #[must_use]
    pub const fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Create a semantic error attached to `span`.
    #[must_use]
    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::Semantic(message.into()), span)
    }

    /// Get the span of this error.
    #[must_use]
    pub const fn span(&self) -> (usize, usize) {
        (self.span.start, self.span.end)
    }

    /// Get a numeric code for the error kind.
    #[must_use]
    pub const fn kind_code(&self) -> u32 {
        match &self.kind {
            ParseErrorKind::UnexpectedEof => 1,
            ParseErrorKind::SyntaxError(_) => 2,
            ParseErrorKind::EmptyInput => 3,
            ParseErrorKind::Custom(_) => 4,
            ParseErrorKind::Semantic(_) => 5,
        }
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Whether this error comes from the type checker rather than the grammar.
    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        matches!(self.kind, ParseErrorKind::Semantic(_))
    }
}

/// Kinds of parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Input ended in the middle of an expression.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// Generic syntax error reported by the grammar.
    #[error("syntax error: {0}")]
    SyntaxError(String),
    /// Input holds nothing but whitespace and comments.
    #[error("no expression found in input")]
    EmptyInput,
    /// A grammar rule rejected otherwise well-formed tokens.
    #[error("{0}")]
    Custom(String),
    /// The expression parsed but is not valid PromQL.
    #[error("{0}")]
    Semantic(String),
}
