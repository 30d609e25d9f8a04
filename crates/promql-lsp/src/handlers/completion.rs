//! Completion handler for autocompletion.
//!
//! Offers built-in functions, aggregation operators and keywords matching
//! the identifier typed before the cursor. Nothing is offered inside string
//! literals or comments.

use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, Documentation,
};
use promql_syntax::ast::AggregateOp;
use promql_syntax::functions::{self, FUNCTIONS, KEYWORDS};

use super::utils::{in_string_or_comment, position_to_offset, word_before};
use crate::cache::CompiledQuery;

/// Handle a completion request.
pub fn handle_completion(
    params: &CompletionParams,
    query: &CompiledQuery,
) -> Option<CompletionResponse> {
    let position = params.text_document_position.position;
    let offset = position_to_offset(&query.text, position)?;

    if in_string_or_comment(&query.text, offset) {
        tracing::debug!("No completion inside string or comment at {:?}", position);
        return None;
    }

    let prefix = word_before(&query.text, offset);
    tracing::debug!("Completion prefix: {:?} at {:?}", prefix, position);

    let items = completions(&prefix);
    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// All completion items whose label starts with `prefix`, ignoring case.
pub fn completions(prefix: &str) -> Vec<CompletionItem> {
    let matches = |label: &str| {
        label.len() >= prefix.len()
            && label.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    };

    let functions = FUNCTIONS
        .iter()
        .filter(|func| matches(func.name))
        .map(|func| CompletionItem {
            label: func.name.to_string(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some(func.signature()),
            documentation: Some(Documentation::String(func.doc.to_string())),
            ..Default::default()
        });

    let aggregations = AggregateOp::ALL
        .iter()
        .filter(|op| matches(op.name()))
        .map(|op| CompletionItem {
            label: op.name().to_string(),
            kind: Some(CompletionItemKind::OPERATOR),
            detail: Some("aggregation".to_string()),
            documentation: Some(Documentation::String(
                functions::aggregation_doc(*op).to_string(),
            )),
            ..Default::default()
        });

    let keywords = KEYWORDS
        .iter()
        .filter(|kw| matches(**kw))
        .map(|kw| CompletionItem {
            label: (*kw).to_string(),
            kind: Some(CompletionItemKind::KEYWORD),
            detail: Some("keyword".to_string()),
            ..Default::default()
        });

    functions.chain(aggregations).chain(keywords).collect()
}
