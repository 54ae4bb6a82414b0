//! Tool executor — the only sanctioned path to tool execution.
//!
//! Wraps every invocation with a per-call timeout bound to a cancellation
//! token (so helper subprocesses die with the deadline) and appends one
//! audit entry per call, success or failure. Direct tool invocation would
//! bypass both controls.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use vigil_core::{ToolResult, ToolSchema};

use crate::audit::{AuditEntry, AuditLog};
use crate::code_search::CodeSearchTool;
use crate::directory_tree::DirectoryTreeTool;
use crate::find_files::FindFilesTool;
use crate::git_log::GitLogTool;
use crate::sandbox::{Sandbox, SandboxError};
use crate::traits::{SandboxTool, ToolContext};
use crate::view_lines::ViewLinesTool;

/// Per-call timeout. Generous for read-only operations — a search that runs
/// longer than this is too broad and should be refined.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Central coordinator for all tool operations of one session.
pub struct ToolExecutor {
    sandbox: Arc<Sandbox>,
    tools: HashMap<String, Arc<dyn SandboxTool>>,
    audit: Arc<AuditLog>,
    timeout: Duration,
}

impl ToolExecutor {
    /// Create an executor bound to a root path, with the built-in tool set
    /// registered. All tool operations are restricted to files under the
    /// root.
    pub fn new(root: impl AsRef<Path>, audit: Arc<AuditLog>) -> Result<Self, SandboxError> {
        let sandbox = Arc::new(Sandbox::new(root)?);
        let mut executor = Self {
            sandbox: sandbox.clone(),
            tools: HashMap::new(),
            audit,
            timeout: DEFAULT_TIMEOUT,
        };

        executor.register(Arc::new(CodeSearchTool::new(sandbox.clone())));
        executor.register(Arc::new(ViewLinesTool::new(sandbox.clone())));
        executor.register(Arc::new(FindFilesTool::new(sandbox.clone())));
        executor.register(Arc::new(DirectoryTreeTool::new(sandbox.clone())));
        executor.register(Arc::new(GitLogTool::new(sandbox)));

        Ok(executor)
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn SandboxTool>) {
        debug!(tool_name = tool.name(), "tool registered");
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// The session sandbox.
    #[must_use]
    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }

    /// The resolved sandbox root, for display.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        self.sandbox.root()
    }

    /// The audit log.
    #[must_use]
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool schemas, ready for any provider.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Run a named tool with the given parameters.
    ///
    /// Controls applied, in order: name validation, timeout supervision with
    /// cancellation fan-out, audit append. Every failure mode returns an
    /// error result — nothing is raised.
    pub async fn execute(&self, tool_name: &str, params: Map<String, Value>) -> ToolResult {
        let Some(tool) = self.tools.get(tool_name) else {
            return ToolResult::error(format!(
                "Unknown tool: {tool_name:?}. Available tools: {:?}",
                self.tool_names()
            ));
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let ctx = ToolContext::new(self.timeout);

        let result = tokio::select! {
            result = tool.execute(&params, &ctx) => result,
            () = tokio::time::sleep(self.timeout) => {
                // Fan the deadline out to the tool's subprocesses, then
                // report the timeout to the model.
                ctx.cancellation.cancel();
                warn!(tool_name, timeout_s = self.timeout.as_secs(), "tool timed out");
                ToolResult::error(format!(
                    "Tool {tool_name:?} timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(tool_name, duration_ms, is_error = result.is_error, "tool executed");

        // The audit trail must be complete: every call lands here.
        self.audit.append(AuditEntry {
            timestamp: started_at,
            tool_name: tool_name.to_owned(),
            params,
            result: result.clone(),
            duration_ms,
        });

        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn executor() -> (tempfile::TempDir, ToolExecutor) {
        let tmp = tempfile::tempdir().unwrap();
        let exec = ToolExecutor::new(tmp.path(), Arc::new(AuditLog::new())).unwrap();
        (tmp, exec)
    }

    /// Tool that sleeps long enough to trip any short timeout.
    struct SlowTool;

    #[async_trait]
    impl SandboxTool for SlowTool {
        fn name(&self) -> &str {
            "slow_tool"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "slow_tool".into(),
                description: "sleeps".into(),
                parameters: BTreeMap::new(),
                required: vec![],
            }
        }
        async fn execute(&self, _params: &Map<String, Value>, _ctx: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ToolResult::ok("never reached")
        }
    }

    #[test]
    fn builtin_tools_registered() {
        let (_tmp, exec) = executor();
        assert_eq!(
            exec.tool_names(),
            vec![
                "code_search",
                "directory_tree",
                "find_files",
                "git_log",
                "view_lines"
            ]
        );
    }

    #[test]
    fn schemas_cover_all_tools() {
        let (_tmp, exec) = executor();
        let schemas = exec.schemas();
        assert_eq!(schemas.len(), 5);
        assert!(schemas.iter().all(|s| !s.description.is_empty()));
    }

    #[tokio::test]
    async fn unknown_tool_enumerates_known() {
        let (_tmp, exec) = executor();
        let r = exec.execute("nmap_scan", Map::new()).await;
        assert!(r.is_error);
        assert!(r.content.contains("Unknown tool"));
        assert!(r.content.contains("code_search"));
        assert!(r.content.contains("view_lines"));
    }

    #[tokio::test]
    async fn every_call_is_audited() {
        let (_tmp, exec) = executor();
        let params = json!({"path": "."}).as_object().unwrap().clone();
        let r = exec.execute("directory_tree", params).await;

        let entries = exec.audit().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tool_name, "directory_tree");
        assert_eq!(entries[0].result.content, r.content);
        assert_eq!(entries[0].result.is_error, r.is_error);
        assert_eq!(entries[0].params["path"], ".");
    }

    #[tokio::test]
    async fn failed_calls_are_audited_too() {
        let (_tmp, exec) = executor();
        let _ = exec.execute("no_such_tool", Map::new()).await;
        let params = json!({"file": "/etc/passwd", "start_line": 1, "end_line": 2});
        let _ = exec
            .execute("view_lines", params.as_object().unwrap().clone())
            .await;

        // Unknown-tool short-circuits before the audit point by design; the
        // sandboxed rejection is recorded.
        let entries = exec.audit().entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].result.is_error);
    }

    #[tokio::test]
    async fn timeout_produces_error_result_within_bound() {
        let tmp = tempfile::tempdir().unwrap();
        let mut exec = ToolExecutor::new(tmp.path(), Arc::new(AuditLog::new()))
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        exec.register(Arc::new(SlowTool));

        let start = Instant::now();
        let r = exec.execute("slow_tool", Map::new()).await;
        let elapsed = start.elapsed();

        assert!(r.is_error);
        assert!(r.content.contains("slow_tool"));
        assert!(r.content.contains("timed out"));
        // timeout + scheduling epsilon
        assert!(elapsed < Duration::from_secs(2));

        // Timeout is audited like any other outcome.
        let entries = exec.audit().entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].result.is_error);
    }

    #[tokio::test]
    async fn empty_repo_tree_call_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("README.md"), "# demo\ntwo lines\n").unwrap();
        let exec = ToolExecutor::new(tmp.path(), Arc::new(AuditLog::new())).unwrap();
        let r = exec.execute("directory_tree", Map::new()).await;
        assert!(!r.is_error);
        assert!(r.content.contains("README.md"));
    }
}
