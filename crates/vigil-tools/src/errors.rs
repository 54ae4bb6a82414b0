//! Tool-internal error types.
//!
//! Tools themselves never raise: their `execute` returns a
//! [`ToolResult`](vigil_core::ToolResult) whose `is_error` flag carries
//! diagnostics to the model. This enum exists for the layers beneath the
//! tools (subprocess launch, guarded file reads) whose failures the tools
//! then translate.

use std::io;

use thiserror::Error;

/// Errors produced by tool infrastructure.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required helper binary is not installed.
    #[error("{name} is not installed. {hint}")]
    HelperMissing {
        /// Binary name (`rg`, `fd`, `git`).
        name: String,
        /// Installation hint shown to the model.
        hint: String,
    },

    /// Helper subprocess could not be spawned.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        source: io::Error,
    },

    /// Generic I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
