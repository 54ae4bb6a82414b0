//! OpenAI-compatible Chat Completions adapter.
//!
//! Serves every registry model with `ProviderKind::OpenAiCompat` — the base
//! URL and pricing vary per model, the wire protocol does not.

mod provider;
mod stream_handler;
mod types;

pub use provider::OpenAiCompatProvider;
pub use stream_handler::{process_chunk, StreamState};
pub use types::ChatChunk;
