//! Language Server Protocol implementation for PromQL.
//!
//! This crate provides an LSP server for Prometheus query expressions:
//! - Syntax and type error diagnostics
//! - Hover information for the expression under the cursor
//! - Completion of functions, aggregations and keywords
//!
//! # Architecture
//!
//! - **Query cache**: every open document is compiled once per version into
//!   an immutable [`CompiledQuery`]; newer versions supersede older ones
//! - **Locator**: maps a cursor offset to the smallest surrounding AST node
//! - **Main loop**: applies document changes in order and dispatches
//!   requests to a worker pool
//!
//! # Example
//!
//! ```
//! use promql_lsp::QueryCache;
//! use std::str::FromStr;
//!
//! let cache = QueryCache::new();
//! let uri = lsp_types::Uri::from_str("file:///query.promql").unwrap();
//! cache.compile(&uri, 1, "rate(http_requests_total[5m])");
//!
//! let node = cache.lookup(&uri, 8).unwrap();
//! assert_eq!(node.kind(), promql_syntax::ExprKind::VectorSelector);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod handlers;
pub mod main_loop;

mod server;

pub use cache::{CompiledQuery, QueryCache};
pub use main_loop::run_main_loop;
pub use server::{capabilities, start_stdio, Server, ServerError};

/// LSP server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
