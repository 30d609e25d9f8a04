//! LSP request and notification handlers.
//!
//! Each handler answers a request against an immutable compiled query.

pub mod utils;

pub mod completion;
pub mod diagnostics;
pub mod hover;
pub mod not_implemented;
