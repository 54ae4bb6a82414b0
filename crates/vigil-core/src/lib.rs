//! # vigil-core
//!
//! Plain data types shared by every Vigil crate: the conversation model
//! exchanged with LLM providers, the tool schema/result contract, and the
//! two event families (provider stream events and runner progress events).
//!
//! This crate holds no I/O and no async code — it is the bottom of the
//! dependency graph.

pub mod events;
pub mod messages;
pub mod text;
pub mod tools;

pub use events::{RunEvent, RunEventType, StreamEvent, WireEvent};
pub use messages::{Block, CompletionRequest, Message, Role, ToolCall, Usage};
pub use tools::{ParamDef, ToolResult, ToolSchema};
