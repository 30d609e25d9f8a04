//! PromQL Language Server.
//!
//! Usage:
//!   promql-lsp              # Start LSP server (stdio)
//!   promql-lsp --version    # Print version
//!   promql-lsp --help       # Print help

use std::process::ExitCode;

use tracing_subscriber::filter::{Directive, EnvFilter};

fn main() -> ExitCode {
    // Parse simple args (no clap needed for LSP server)
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("promql-lsp {}", promql_lsp::VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("PromQL Language Server");
        println!();
        println!("Usage: promql-lsp [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --help     Print help");
        println!("  -V, --version  Print version");
        println!();
        println!("The server communicates via stdio using the Language Server Protocol.");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG       Set log level (e.g., RUST_LOG=promql_lsp=debug)");
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr, stdout carries the protocol
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "promql_lsp=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match promql_lsp::start_stdio() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
