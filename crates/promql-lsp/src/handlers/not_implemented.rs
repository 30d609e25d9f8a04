//! Standard protocol methods the server recognises but does not support.

use lsp_types::notification::{
    DidChangeWatchedFiles, DidChangeWorkspaceFolders, DidSaveTextDocument, LogTrace,
    Notification, Progress, SetTrace, WillSaveTextDocument,
};
use lsp_types::request::{
    CodeActionRequest, CodeLensRequest, CodeLensResolve, ColorPresentationRequest,
    DocumentColor, DocumentHighlightRequest, DocumentLinkRequest, DocumentLinkResolve,
    DocumentSymbolRequest, ExecuteCommand, FoldingRangeRequest, Formatting, GotoDeclaration,
    GotoDefinition, GotoImplementation, GotoTypeDefinition, OnTypeFormatting,
    PrepareRenameRequest, RangeFormatting, References, Rename, Request, ResolveCompletionItem,
    SelectionRangeRequest, SignatureHelpRequest, WillSaveWaitUntil, WorkspaceSymbolRequest,
};

/// Requests answered with a `MethodNotFound` error.
pub const REQUESTS: &[&str] = &[
    CodeActionRequest::METHOD,
    CodeLensRequest::METHOD,
    CodeLensResolve::METHOD,
    ColorPresentationRequest::METHOD,
    DocumentColor::METHOD,
    DocumentHighlightRequest::METHOD,
    DocumentLinkRequest::METHOD,
    DocumentLinkResolve::METHOD,
    DocumentSymbolRequest::METHOD,
    ExecuteCommand::METHOD,
    FoldingRangeRequest::METHOD,
    Formatting::METHOD,
    GotoDeclaration::METHOD,
    GotoDefinition::METHOD,
    GotoImplementation::METHOD,
    GotoTypeDefinition::METHOD,
    OnTypeFormatting::METHOD,
    PrepareRenameRequest::METHOD,
    RangeFormatting::METHOD,
    References::METHOD,
    Rename::METHOD,
    ResolveCompletionItem::METHOD,
    SelectionRangeRequest::METHOD,
    SignatureHelpRequest::METHOD,
    WillSaveWaitUntil::METHOD,
    WorkspaceSymbolRequest::METHOD,
];

/// Notifications that are logged and otherwise ignored.
pub const NOTIFICATIONS: &[&str] = &[
    DidChangeWatchedFiles::METHOD,
    DidChangeWorkspaceFolders::METHOD,
    DidSaveTextDocument::METHOD,
    LogTrace::METHOD,
    Progress::METHOD,
    SetTrace::METHOD,
    WillSaveTextDocument::METHOD,
];

/// Whether `method` is a request listed in [`REQUESTS`].
pub fn is_unsupported_request(method: &str) -> bool {
    REQUESTS.contains(&method)
}

/// Whether `method` is a notification listed in [`NOTIFICATIONS`].
pub fn is_unsupported_notification(method: &str) -> bool {
    NOTIFICATIONS.contains(&method)
}

/// Error message for an unsupported method.
pub fn message(method: &str) -> String {
    format!("method {method:?} not yet implemented")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message() {
        assert_eq!(
            message("textDocument/rename"),
            r#"method "textDocument/rename" not yet implemented"#
        );
    }

    #[test]
    fn test_lists() {
        assert!(is_unsupported_request("textDocument/definition"));
        assert!(is_unsupported_request("completionItem/resolve"));
        assert!(!is_unsupported_request("textDocument/hover"));
        assert!(!is_unsupported_request("textDocument/completion"));

        assert!(is_unsupported_notification("textDocument/didSave"));
        assert!(is_unsupported_notification("$/setTrace"));
        assert!(!is_unsupported_notification("workspace/didChangeConfiguration"));
    }
}
