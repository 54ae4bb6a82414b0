//! # vigil-llm
//!
//! Uniform contract over heterogeneous LLM wire protocols. Each adapter
//! translates the abstract `{system, messages, tools}` request into its
//! vendor's format and normalizes the streamed response into one
//! [`StreamEvent`](vigil_core::StreamEvent) sequence: text deltas, thinking
//! deltas, fully-formed tool calls, and a terminal `done` (or `error`).
//!
//! The adapter is the authoritative source of [`Usage`](vigil_core::Usage):
//! token counts are priced against the static model registry before `done`
//! is emitted.

pub mod anthropic;
pub mod models;
pub mod openai;
pub mod provider;
pub mod sse;

pub use models::{create_provider, model_info, model_ids, ModelInfo, ProviderKind};
pub use provider::{EventStream, Provider, ProviderError, ProviderResult};
