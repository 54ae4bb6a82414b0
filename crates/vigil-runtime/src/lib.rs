//! # vigil-runtime
//!
//! The agent execution engine: the turn loop that drives a streaming LLM
//! provider against the sandboxed tool executor, under a five-dimensional
//! resource budget, publishing progress to observers through per-session
//! bounded event channels.

pub mod broker;
pub mod budget;
pub mod channel;
pub mod collab;
pub mod prompt;
pub mod runner;

pub use broker::{event_stream, EventChannel, SessionBroker};
pub use budget::{Budget, BudgetTracker};
pub use channel::AgentChannel;
pub use collab::{run_collaborative, CollabConfig};
pub use prompt::{build_system_prompt, BountyProgram, PromptConfig, ScopeConfig};
pub use runner::{Runner, RunnerConfig};
