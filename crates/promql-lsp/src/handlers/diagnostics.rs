//! Diagnostics handler for publishing parse and type errors.

use lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};
use promql_syntax::ParseError;
use ropey::Rope;

use super::utils::span_to_range;
use crate::cache::CompiledQuery;

/// Convert the errors of a compiled query to LSP diagnostics.
pub fn query_diagnostics(query: &CompiledQuery) -> Vec<Diagnostic> {
    query
        .errors
        .iter()
        .map(|e| parse_error_to_diagnostic(e, &query.text))
        .collect()
}

/// Convert a single parse error to an LSP diagnostic.
pub fn parse_error_to_diagnostic(error: &ParseError, text: &Rope) -> Diagnostic {
    Diagnostic {
        range: span_to_range(text, error.span),
        severity: Some(DiagnosticSeverity::ERROR),
        code: Some(NumberOrString::String(format!("E{:04}", error.kind_code()))),
        source: Some("promql".to_string()),
        message: error.message(),
        related_information: None,
        tags: None,
        code_description: None,
        data: None,
    }
}
