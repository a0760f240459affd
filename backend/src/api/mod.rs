//! HTTP API module.
//!
//! A small axum server that runs the pipeline on uploaded files and streams
//! run logs over SSE.

pub mod server;
pub mod types;

pub use server::{router, run_preview, start_server, PreviewRequest};
pub use types::*;
