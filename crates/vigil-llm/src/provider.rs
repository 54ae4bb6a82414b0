//! # Provider Trait
//!
//! Core abstraction for LLM backends. Every adapter implements [`Provider`]
//! to expose a unified streaming interface.
//!
//! `complete` returns a boxed [`Stream`] of [`StreamEvent`]s. The stream's
//! ordering guarantees: text deltas in emission order, exactly one
//! `tool_call` per function call with fully-formed arguments, a single
//! terminal `done` carrying priced usage — or an `error` replacing it.
//! Stream-level failures after the request is accepted surface in-band as
//! `StreamEvent::Error`; only request construction and connection failures
//! are returned as [`ProviderError`].

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use vigil_core::{CompletionRequest, StreamEvent};

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed stream of [`StreamEvent`]s returned by [`Provider::complete`].
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Errors that can occur setting up a provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed before streaming began.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication problem (missing or rejected key).
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Vendor returned a non-success status to the initial request.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body or description.
        message: String,
    },

    /// The requested model is not in the registry.
    #[error("unknown model {model:?}")]
    UnknownModel {
        /// The requested model ID.
        model: String,
    },
}

/// Core LLM provider trait.
///
/// Implementors must be `Send + Sync`; the runner holds them behind
/// `Arc<dyn Provider>` and calls `complete` once per turn.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier (`"anthropic"`, `"openai_compat"`).
    fn name(&self) -> &str;

    /// Model string sent to the API.
    fn model_id(&self) -> &str;

    /// The model's context window size.
    fn max_context_tokens(&self) -> u32;

    /// Send a conversation and stream back normalized events.
    ///
    /// `cancel` aborts the stream cooperatively; a cancelled stream ends
    /// with `StreamEvent::Error` mentioning cancellation.
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> ProviderResult<EventStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
