//! Main LSP server implementation.

use lsp_server::Connection;
use lsp_types::InitializeParams;

use crate::main_loop::run_main_loop;

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The initialize handshake failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] lsp_server::ProtocolError),
    /// Initialize parameters or results could not be (de)serialized.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The stdio transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The client sent `exit` without a prior `shutdown`.
    #[error("exit received before shutdown")]
    ExitWithoutShutdown,
}

/// The LSP server.
pub struct Server {
    /// Connection to the LSP client.
    connection: Connection,
    /// Initialize parameters from client.
    init_params: InitializeParams,
}

impl Server {
    /// Create a new LSP server from a connection.
    pub const fn new(connection: Connection, init_params: InitializeParams) -> Self {
        Self {
            connection,
            init_params,
        }
    }

    /// Run the server's main loop.
    ///
    /// Returns whether the client requested shutdown before the loop ended.
    pub fn run(self) -> bool {
        tracing::info!("Starting PromQL Language Server v{}", crate::VERSION);

        if let Some(client) = &self.init_params.client_info {
            tracing::info!(
                "Client: {} {}",
                client.name,
                client.version.as_deref().unwrap_or("")
            );
        }

        let (sender, receiver) = (self.connection.sender, self.connection.receiver);
        let clean = run_main_loop(receiver, sender);

        tracing::info!("Server shutdown complete");
        clean
    }
}

/// Capabilities announced in the initialize result.
pub fn capabilities() -> lsp_types::ServerCapabilities {
    lsp_types::ServerCapabilities {
        text_document_sync: Some(lsp_types::TextDocumentSyncCapability::Kind(
            lsp_types::TextDocumentSyncKind::FULL,
        )),
        completion_provider: Some(lsp_types::CompletionOptions {
            trigger_characters: Some(vec![
                "(".to_string(), // Function arguments
                " ".to_string(), // After operators and keywords
            ]),
            ..Default::default()
        }),
        hover_provider: Some(lsp_types::HoverProviderCapability::Simple(true)),
        ..Default::default()
    }
}

/// Start the LSP server using stdio transport.
pub fn start_stdio() -> Result<(), ServerError> {
    tracing::info!("Starting LSP server on stdio");

    let (connection, io_threads) = Connection::stdio();

    // Wait for initialize request
    let (id, params) = connection.initialize_start()?;
    let init_params: InitializeParams = serde_json::from_value(params)?;

    let init_result = lsp_types::InitializeResult {
        capabilities: capabilities(),
        server_info: Some(lsp_types::ServerInfo {
            name: "promql-lsp".to_string(),
            version: Some(crate::VERSION.to_string()),
        }),
    };

    connection.initialize_finish(id, serde_json::to_value(init_result)?)?;

    tracing::info!("LSP initialized successfully");

    let clean = Server::new(connection, init_params).run();

    // Wait for IO threads to finish
    io_threads.join()?;

    if clean {
        Ok(())
    } else {
        Err(ServerError::ExitWithoutShutdown)
    }
}
