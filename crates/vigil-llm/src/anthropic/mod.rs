//! Anthropic Messages API adapter.

mod provider;
mod stream_handler;
mod types;

pub use provider::AnthropicProvider;
pub use stream_handler::{process_sse_event, StreamState};
pub use types::AnthropicSseEvent;
