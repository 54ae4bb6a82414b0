//! `find_files` — locate files by name pattern or extension.
//!
//! Typically the agent's first call after the tree: finding configuration
//! files, entry points, and security-relevant files (Dockerfiles, CI
//! configs). Prefers `fd`, falls back to `find -P`; both are run with
//! symlink following disabled.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use vigil_core::{ParamDef, ToolResult, ToolSchema};

use crate::sandbox::Sandbox;
use crate::subprocess::{run_helper, HelperOutput};
use crate::traits::{SandboxTool, ToolContext};

/// Results cap.
const MAX_FILES: usize = 200;

/// Locate files by name or extension.
pub struct FindFilesTool {
    sandbox: Arc<Sandbox>,
}

impl FindFilesTool {
    /// Create the tool over a session sandbox.
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }

    async fn run_fd(
        &self,
        pattern: Option<&str>,
        extension: Option<&str>,
        target: &Path,
        ctx: &ToolContext,
    ) -> Result<HelperOutput, crate::ToolError> {
        let mut args: Vec<String> = vec![
            "--no-follow".into(),
            "--color=never".into(),
            "--type".into(),
            "f".into(),
        ];
        if let Some(ext) = extension {
            args.push("--extension".into());
            args.push(ext.to_owned());
        }
        if let Some(pat) = pattern {
            args.push(pat.to_owned());
        }
        args.push(target.to_string_lossy().into_owned());
        run_helper("fd", &args, self.sandbox.root(), &[], ctx).await
    }

    async fn run_find(
        &self,
        pattern: Option<&str>,
        extension: Option<&str>,
        target: &Path,
        ctx: &ToolContext,
    ) -> Result<HelperOutput, crate::ToolError> {
        // -P: never follow symlinks.
        let mut args: Vec<String> = vec![
            "-P".into(),
            target.to_string_lossy().into_owned(),
            "-maxdepth".into(),
            "20".into(),
            "-type".into(),
            "f".into(),
        ];
        let name_glob = match (pattern, extension) {
            (Some(p), Some(e)) => Some(format!("*{p}*.{e}")),
            (Some(p), None) => Some(format!("*{p}*")),
            (None, Some(e)) => Some(format!("*.{e}")),
            (None, None) => None,
        };
        if let Some(glob) = name_glob {
            args.push("-name".into());
            args.push(glob);
        }
        run_helper("find", &args, self.sandbox.root(), &[], ctx).await
    }
}

#[async_trait]
impl SandboxTool for FindFilesTool {
    fn name(&self) -> &str {
        "find_files"
    }

    fn description(&self) -> &str {
        "Find files by name pattern or extension. Uses fd if available, \
         falls back to find. Useful for discovering project structure, \
         config files, and security-relevant files (Dockerfile, .env.example, etc.)"
    }

    fn schema(&self) -> ToolSchema {
        let mut parameters = BTreeMap::new();
        let _ = parameters.insert(
            "pattern".to_owned(),
            ParamDef::string("Filename pattern to search for (e.g., 'auth', 'middleware', 'config')"),
        );
        let _ = parameters.insert(
            "path".to_owned(),
            ParamDef::string("Directory to search in (relative to repo root)"),
        );
        let _ = parameters.insert(
            "extension".to_owned(),
            ParamDef::string("Filter by file extension without dot (e.g., 'go', 'py', 'yaml')"),
        );
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters,
            required: vec![],
        }
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let pattern = match crate::params::optional_str(params, "pattern") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let search_path = match crate::params::optional_str(params, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let extension = match crate::params::optional_str(params, "extension") {
            Ok(p) => p,
            Err(e) => return e,
        };

        if pattern.is_none() && extension.is_none() {
            return ToolResult::error("At least one of 'pattern' or 'extension' must be provided.");
        }

        let target = match &search_path {
            Some(p) => match self.sandbox.validate_path(p) {
                Ok(v) => v,
                Err(e) => return ToolResult::error(format!("Path validation failed: {e}")),
            },
            None => self.sandbox.root().to_path_buf(),
        };

        let output = match self
            .run_fd(pattern.as_deref(), extension.as_deref(), &target, ctx)
            .await
        {
            Ok(o) => o,
            Err(crate::ToolError::HelperMissing { .. }) => {
                match self
                    .run_find(pattern.as_deref(), extension.as_deref(), &target, ctx)
                    .await
                {
                    Ok(o) => o,
                    Err(e) => return ToolResult::error(e.to_string()),
                }
            }
            Err(e) => return ToolResult::error(e.to_string()),
        };
        if output.timed_out || output.interrupted {
            return ToolResult::error("find_files was cancelled before completing");
        }

        match output.exit_code {
            Some(0 | 1) => {}
            _ => {
                return ToolResult::error(format!(
                    "Search error (exit {:?}): {}",
                    output.exit_code,
                    output.stderr.trim()
                ));
            }
        }

        let trimmed = output.stdout.trim();
        if trimmed.is_empty() {
            return ToolResult::ok("No files found matching the criteria.")
                .with_meta("count", json!(0));
        }

        let root_prefix = format!("{}/", self.sandbox.root().display());
        let relative = trimmed.replace(&root_prefix, "");
        let lines: Vec<&str> = relative.lines().collect();
        let total = lines.len();

        let mut body = lines[..total.min(MAX_FILES)].join("\n");
        if total > MAX_FILES {
            body.push_str(&format!(
                "\n\n... and more (showing first {MAX_FILES} results, narrow your search)"
            ));
        }

        ToolResult::ok(body)
            .with_meta("count", json!(total.min(MAX_FILES)))
            .with_meta("total", json!(total))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn fixture() -> (tempfile::TempDir, FindFilesTool) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/auth_handler.go"), "package main").unwrap();
        fs::write(tmp.path().join("src/util.go"), "package main").unwrap();
        fs::write(tmp.path().join("Dockerfile"), "FROM scratch").unwrap();
        let sandbox = Arc::new(Sandbox::new(tmp.path()).unwrap());
        (tmp, FindFilesTool::new(sandbox))
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Duration::from_secs(30))
    }

    #[test]
    fn schema_has_no_required_params() {
        let (_tmp, tool) = fixture();
        assert!(tool.schema().required.is_empty());
    }

    #[tokio::test]
    async fn requires_pattern_or_extension() {
        let (_tmp, tool) = fixture();
        let r = tool.execute(&Map::new(), &ctx()).await;
        assert!(r.is_error);
        assert!(r.content.contains("pattern"));
        assert!(r.content.contains("extension"));
    }

    #[tokio::test]
    async fn path_outside_sandbox_rejected() {
        let (_tmp, tool) = fixture();
        let params = json!({"pattern": "auth", "path": "/etc"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(r.is_error);
        assert!(r.content.contains("Path validation failed"));
    }

    #[tokio::test]
    async fn finds_by_extension() {
        let (_tmp, tool) = fixture();
        let params = json!({"extension": "go"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("auth_handler.go"));
        assert!(r.content.contains("util.go"));
        assert!(!r.content.contains("Dockerfile"));
    }

    #[tokio::test]
    async fn finds_by_pattern() {
        let (_tmp, tool) = fixture();
        let params = json!({"pattern": "auth"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("auth_handler.go"));
        assert!(!r.content.contains("util.go"));
    }

    #[tokio::test]
    async fn no_matches_is_friendly() {
        let (_tmp, tool) = fixture();
        let params = json!({"pattern": "zzz_nothing"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.is_error);
        assert!(r.content.contains("No files found"));
        assert_eq!(r.metadata["count"], 0);
    }

    #[tokio::test]
    async fn output_paths_are_relative() {
        let (_tmp, tool) = fixture();
        let params = json!({"extension": "go"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.content.contains(tool.sandbox.root().to_str().unwrap()));
    }
}
