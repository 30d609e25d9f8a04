//! Main event loop for the LSP server.
//!
//! - Notifications are handled in order on the loop thread, so a document is
//!   always compiled before later requests for it are dispatched
//! - Hover and completion requests run on the rayon pool against the shared
//!   [`QueryCache`] and report back over a task channel
//! - Unsupported protocol methods are answered with `MethodNotFound`

use std::sync::Arc;

use crossbeam_channel::{select, Receiver, Sender};
use lsp_server::{ErrorCode, RequestId};
use lsp_types::notification::{
    DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument,
    Exit, Initialized, Notification, PublishDiagnostics,
};
use lsp_types::request::{Completion, HoverRequest, Request, Shutdown};
use lsp_types::{CompletionParams, HoverParams, PublishDiagnosticsParams, Uri};

use crate::cache::QueryCache;
use crate::handlers::completion::handle_completion;
use crate::handlers::diagnostics::query_diagnostics;
use crate::handlers::hover::handle_hover;
use crate::handlers::not_implemented;

/// Events processed by the main loop.
#[derive(Debug)]
pub enum Event {
    /// LSP message from the client.
    Message(lsp_server::Message),
    /// Response from a background task.
    Task(TaskResult),
}

/// Result from a background task.
#[derive(Debug)]
pub struct TaskResult {
    /// The request ID this task is responding to.
    pub request_id: RequestId,
    /// The result of the task, or an error message.
    pub result: Result<serde_json::Value, String>,
}

/// State managed by the main loop.
pub struct MainLoopState {
    /// Compiled queries of open documents.
    pub cache: Arc<QueryCache>,
    /// Sender for outgoing LSP messages.
    pub sender: Sender<lsp_server::Message>,
    /// Sender handed to background tasks.
    tasks: Sender<TaskResult>,
    /// Whether shutdown was requested.
    pub shutdown_requested: bool,
    /// Whether the exit notification was received.
    pub exit_requested: bool,
}

impl MainLoopState {
    /// Create a new main loop state.
    pub fn new(sender: Sender<lsp_server::Message>, tasks: Sender<TaskResult>) -> Self {
        Self {
            cache: Arc::new(QueryCache::new()),
            sender,
            tasks,
            shutdown_requested: false,
            exit_requested: false,
        }
    }

    /// Handle an incoming event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Message(lsp_server::Message::Request(req)) => self.handle_request(req),
            Event::Message(lsp_server::Message::Notification(notif)) => {
                self.handle_notification(notif);
            }
            Event::Message(lsp_server::Message::Response(resp)) => {
                // We don't send requests to the client
                tracing::debug!("Ignoring response {:?}", resp.id);
            }
            Event::Task(task) => self.respond(task.request_id, task.result),
        }
    }

    /// Handle an LSP request (expects response).
    fn handle_request(&mut self, req: lsp_server::Request) {
        let id = req.id.clone();

        if self.shutdown_requested && req.method != Shutdown::METHOD {
            self.respond_err(
                id,
                ErrorCode::InvalidRequest,
                "server is shutting down".to_string(),
            );
            return;
        }

        match req.method.as_str() {
            Shutdown::METHOD => {
                tracing::info!("Shutdown requested");
                self.shutdown_requested = true;
                self.respond(id, Ok(serde_json::Value::Null));
            }
            HoverRequest::METHOD => self.spawn(id, move |cache| hover_request(cache, req.params)),
            Completion::METHOD => {
                self.spawn(id, move |cache| completion_request(cache, req.params));
            }
            method if not_implemented::is_unsupported_request(method) => {
                tracing::debug!("Unsupported request: {}", method);
                self.respond_err(id, ErrorCode::MethodNotFound, not_implemented::message(method));
            }
            method => {
                tracing::warn!("Unhandled request: {}", method);
                self.respond_err(
                    id,
                    ErrorCode::MethodNotFound,
                    format!("Unhandled request: {method}"),
                );
            }
        }
    }

    /// Handle an LSP notification (no response).
    fn handle_notification(&mut self, notif: lsp_server::Notification) {
        match notif.method.as_str() {
            DidOpenTextDocument::METHOD => {
                let params = parse_params::<lsp_types::DidOpenTextDocumentParams>(
                    DidOpenTextDocument::METHOD,
                    notif.params,
                );
                if let Some(params) = params {
                    self.on_did_open(params);
                }
            }
            DidChangeTextDocument::METHOD => {
                let params = parse_params::<lsp_types::DidChangeTextDocumentParams>(
                    DidChangeTextDocument::METHOD,
                    notif.params,
                );
                if let Some(params) = params {
                    self.on_did_change(params);
                }
            }
            DidCloseTextDocument::METHOD => {
                let params = parse_params::<lsp_types::DidCloseTextDocumentParams>(
                    DidCloseTextDocument::METHOD,
                    notif.params,
                );
                if let Some(params) = params {
                    self.on_did_close(params);
                }
            }
            DidChangeConfiguration::METHOD => {}
            Initialized::METHOD => tracing::info!("Client initialized"),
            Exit::METHOD => {
                tracing::info!("Exit notification received");
                self.exit_requested = true;
            }
            method if not_implemented::is_unsupported_notification(method) => {
                tracing::debug!("{}", not_implemented::message(method));
            }
            method => tracing::debug!("Unhandled notification: {}", method),
        }
    }

    /// Handle textDocument/didOpen notification.
    fn on_did_open(&self, params: lsp_types::DidOpenTextDocumentParams) {
        let doc = params.text_document;
        tracing::info!("Document opened: {}", doc.uri.as_str());

        self.cache.compile(&doc.uri, doc.version, &doc.text);
        self.publish_diagnostics(&doc.uri);
    }

    /// Handle textDocument/didChange notification.
    fn on_did_change(&self, params: lsp_types::DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Full sync: the last change holds the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            tracing::debug!("Document changed: {} (version {})", uri.as_str(), version);

            self.cache.compile(&uri, version, &change.text);
            self.publish_diagnostics(&uri);
        }
    }

    /// Handle textDocument/didClose notification.
    fn on_did_close(&self, params: lsp_types::DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("Document closed: {}", uri.as_str());

        self.cache.evict(&uri);
        self.send_diagnostics(&uri, Vec::new(), None);
    }

    /// Publish the diagnostics of the stored version of a document.
    fn publish_diagnostics(&self, uri: &Uri) {
        let Some(query) = self.cache.get(uri) else {
            return;
        };
        let diagnostics = query_diagnostics(&query);

        tracing::debug!(
            "Publishing {} diagnostics for {}",
            diagnostics.len(),
            uri.as_str()
        );

        self.send_diagnostics(uri, diagnostics, Some(query.version));
    }

    /// Send diagnostics to the client.
    fn send_diagnostics(
        &self,
        uri: &Uri,
        diagnostics: Vec<lsp_types::Diagnostic>,
        version: Option<i32>,
    ) {
        let params = PublishDiagnosticsParams {
            uri: uri.clone(),
            diagnostics,
            version,
        };

        let notif = lsp_server::Notification::new(PublishDiagnostics::METHOD.to_string(), params);

        self.send(lsp_server::Message::Notification(notif));
    }

    /// Run a request on the worker pool.
    fn spawn<F>(&self, id: RequestId, task: F)
    where
        F: FnOnce(&QueryCache) -> Result<serde_json::Value, String> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let tasks = self.tasks.clone();
        rayon::spawn(move || {
            let result = task(&cache);
            if tasks
                .send(TaskResult {
                    request_id: id,
                    result,
                })
                .is_err()
            {
                tracing::debug!("Main loop gone, dropping task result");
            }
        });
    }

    /// Answer a request with a handler result.
    fn respond(&self, id: RequestId, result: Result<serde_json::Value, String>) {
        match result {
            Ok(value) => self.send(lsp_server::Response::new_ok(id, value).into()),
            Err(msg) => self.respond_err(id, ErrorCode::InternalError, msg),
        }
    }

    /// Answer a request with an error.
    fn respond_err(&self, id: RequestId, code: ErrorCode, msg: String) {
        self.send(lsp_server::Response::new_err(id, code as i32, msg).into());
    }

    /// Send a message to the client.
    fn send(&self, msg: lsp_server::Message) {
        if let Err(e) = self.sender.send(msg) {
            tracing::error!("Failed to send message: {}", e);
        }
    }
}

/// Deserialize notification parameters, logging malformed ones.
fn parse_params<P: serde::de::DeserializeOwned>(
    method: &str,
    params: serde_json::Value,
) -> Option<P> {
    match serde_json::from_value(params) {
        Ok(params) => Some(params),
        Err(e) => {
            tracing::warn!("Invalid params for {}: {}", method, e);
            None
        }
    }
}

/// Handle the textDocument/hover request.
fn hover_request(
    cache: &QueryCache,
    params: serde_json::Value,
) -> Result<serde_json::Value, String> {
    let params: HoverParams = serde_json::from_value(params).map_err(|e| e.to_string())?;

    let uri = &params.text_document_position_params.text_document.uri;
    let response = cache.get(uri).and_then(|query| handle_hover(&params, &query));

    serde_json::to_value(response).map_err(|e| e.to_string())
}

/// Handle the textDocument/completion request.
fn completion_request(
    cache: &QueryCache,
    params: serde_json::Value,
) -> Result<serde_json::Value, String> {
    let params: CompletionParams = serde_json::from_value(params).map_err(|e| e.to_string())?;

    let uri = &params.text_document_position.text_document.uri;
    let response = cache
        .get(uri)
        .and_then(|query| handle_completion(&params, &query));

    serde_json::to_value(response).map_err(|e| e.to_string())
}

/// Run the main event loop.
///
/// Returns whether shutdown was requested before the loop ended.
pub fn run_main_loop(
    receiver: Receiver<lsp_server::Message>,
    sender: Sender<lsp_server::Message>,
) -> bool {
    let (task_sender, task_receiver) = crossbeam_channel::unbounded();
    let mut state = MainLoopState::new(sender, task_sender);

    tracing::info!("Main loop started");

    while !state.exit_requested {
        let event = select! {
            recv(receiver) -> msg => match msg {
                Ok(msg) => Event::Message(msg),
                Err(_) => {
                    tracing::info!("Client connection closed");
                    break;
                }
            },
            recv(task_receiver) -> task => match task {
                Ok(task) => Event::Task(task),
                Err(_) => continue,
            },
        };

        state.handle_event(event);
    }

    tracing::info!("Main loop ended");
    state.shutdown_requested
}
