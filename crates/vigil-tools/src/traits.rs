//! The tool trait and execution context.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use vigil_core::{ToolResult, ToolSchema};

/// Execution context threaded from the executor into every tool invocation.
///
/// Tools that launch helper subprocesses must hand the cancellation token to
/// the launch so the helper dies when the per-call timeout fires or the
/// session is cancelled.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Cooperative cancellation for this call.
    pub cancellation: CancellationToken,
    /// The executor's per-call deadline, for tools that want their own
    /// tighter bound on helper subprocesses.
    pub timeout: Duration,
}

impl ToolContext {
    /// Create a context with a fresh token and the given deadline.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            timeout,
        }
    }
}

/// A named, schema-described, read-only primitive.
///
/// Implementations are pure with respect to state — no hidden globals — and
/// must pass every filesystem access through the session's
/// [`Sandbox`](crate::Sandbox) first. Failures are reported inside the
/// returned [`ToolResult`], never raised.
#[async_trait]
pub trait SandboxTool: Send + Sync {
    /// Stable identifier used in tool calls.
    fn name(&self) -> &str;

    /// Description written for the model.
    fn description(&self) -> &str;

    /// Full schema sent to the provider each turn.
    fn schema(&self) -> ToolSchema;

    /// Execute with parsed JSON parameters.
    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult;
}
