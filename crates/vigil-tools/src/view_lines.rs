//! `view_lines` — read a bounded line range from a file.
//!
//! This is the agent's eyes: it searches with `code_search`, then reads the
//! surrounding context here. The range is capped at 100 lines per call; if
//! more context is needed the model makes more calls. Oversize, binary,
//! directory, and non-regular targets are refused by the shared read guard.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use vigil_core::{ParamDef, ToolResult, ToolSchema};

use crate::fs_guard::check_text_file;
use crate::sandbox::Sandbox;
use crate::traits::{SandboxTool, ToolContext};

/// Lines returned by a single call.
const MAX_VIEW_LINES: i64 = 100;
/// Per-line buffer: lines longer than this are truncated (minified JS).
const MAX_LINE_BYTES: usize = 256 * 1024;

/// Read a line range with a numbered gutter.
pub struct ViewLinesTool {
    sandbox: Arc<Sandbox>,
}

impl ViewLinesTool {
    /// Create the tool over a session sandbox.
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl SandboxTool for ViewLinesTool {
    fn name(&self) -> &str {
        "view_lines"
    }

    fn description(&self) -> &str {
        "Read specific lines from a file. Returns the content with line \
         numbers. Use this after code_search to examine code context around \
         matches. Maximum 100 lines per request."
    }

    fn schema(&self) -> ToolSchema {
        let mut parameters = BTreeMap::new();
        let _ = parameters.insert(
            "file".to_owned(),
            ParamDef::string("Path to the file (relative to repo root, or absolute within repo)"),
        );
        let _ = parameters.insert(
            "start_line".to_owned(),
            ParamDef::integer("First line to read (1-indexed)"),
        );
        let _ = parameters.insert(
            "end_line".to_owned(),
            ParamDef::integer("Last line to read (1-indexed, inclusive)"),
        );
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters,
            required: vec!["file".into(), "start_line".into(), "end_line".into()],
        }
    }

    async fn execute(&self, params: &Map<String, Value>, _ctx: &ToolContext) -> ToolResult {
        let file = match crate::params::required_str(params, "file") {
            Ok(f) => f,
            Err(e) => return e,
        };
        let start_line = match crate::params::required_int(params, "start_line") {
            Ok(n) => n,
            Err(e) => return e,
        };
        let mut end_line = match crate::params::required_int(params, "end_line") {
            Ok(n) => n,
            Err(e) => return e,
        };

        if start_line < 1 {
            return ToolResult::error("start_line must be >= 1");
        }
        if end_line < start_line {
            return ToolResult::error(format!(
                "end_line ({end_line}) must be >= start_line ({start_line})"
            ));
        }
        // Cap the window instead of erroring; the model can continue from
        // where the window ended.
        if end_line - start_line + 1 > MAX_VIEW_LINES {
            end_line = start_line + MAX_VIEW_LINES - 1;
        }

        let validated = match self.sandbox.validate_path(&file) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("Path validation failed: {e}")),
        };

        if let Err(refusal) = check_text_file(&validated, &file).await {
            return refusal;
        }

        let opened = match tokio::fs::File::open(&validated).await {
            Ok(f) => f,
            Err(e) => return ToolResult::error(format!("Cannot open file: {e}")),
        };
        let mut reader = BufReader::new(opened);

        let mut output = String::new();
        let mut buf: Vec<u8> = Vec::with_capacity(256);
        let mut line_num: i64 = 0;
        let mut lines_read: i64 = 0;
        let mut total_lines: i64 = 0;

        loop {
            buf.clear();
            let n = match reader.read_until(b'\n', &mut buf).await {
                Ok(n) => n,
                Err(e) => return ToolResult::error(format!("Error reading file: {e}")),
            };
            if n == 0 {
                break;
            }
            line_num += 1;
            total_lines = line_num;

            if line_num < start_line {
                continue;
            }
            if line_num > end_line {
                break;
            }

            if buf.last() == Some(&b'\n') {
                let _ = buf.pop();
            }
            if buf.last() == Some(&b'\r') {
                let _ = buf.pop();
            }
            let truncated = buf.len() > MAX_LINE_BYTES;
            if truncated {
                buf.truncate(MAX_LINE_BYTES);
            }
            let line = String::from_utf8_lossy(&buf);
            output.push_str(&format!("{line_num:>4} | {line}"));
            if truncated {
                output.push_str(" [line truncated]");
            }
            output.push('\n');
            lines_read += 1;
        }

        if lines_read == 0 {
            return ToolResult::error(format!(
                "No lines in range {start_line}-{end_line}. File has {total_lines} lines."
            ));
        }

        let display_path = validated
            .strip_prefix(self.sandbox.root())
            .map_or_else(|_| validated.display().to_string(), |p| p.display().to_string());
        let last_line = start_line + lines_read - 1;
        let header = format!("── {display_path} (lines {start_line}–{last_line}) ──\n");

        ToolResult::ok(header + &output)
            .with_meta("file", json!(display_path))
            .with_meta("start_line", json!(start_line))
            .with_meta("end_line", json!(last_line))
            .with_meta("lines_read", json!(lines_read))
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

    fn fixture(content: &str) -> (tempfile::TempDir, ViewLinesTool) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("code.rs"), content).unwrap();
        let sandbox = Arc::new(Sandbox::new(tmp.path()).unwrap());
        (tmp, ViewLinesTool::new(sandbox))
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Duration::from_secs(30))
    }

    fn call(tool: &ViewLinesTool, params: Value) -> impl std::future::Future<Output = ToolResult> + '_ {
        let map = params.as_object().unwrap().clone();
        async move { tool.execute(&map, &ctx()).await }
    }

    #[tokio::test]
    async fn reads_range_with_gutter() {
        let content = (1..=10).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let (_tmp, tool) = fixture(&content);
        let r = call(&tool, json!({"file": "code.rs", "start_line": 3, "end_line": 5})).await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("   3 | line 3"));
        assert!(r.content.contains("   5 | line 5"));
        assert!(!r.content.contains("line 6"));
        assert_eq!(r.metadata["lines_read"], 3);
    }

    #[tokio::test]
    async fn header_names_file_and_range() {
        let (_tmp, tool) = fixture("a\nb\nc\n");
        let r = call(&tool, json!({"file": "code.rs", "start_line": 1, "end_line": 2})).await;
        assert!(r.content.starts_with("── code.rs (lines 1–2) ──"));
    }

    #[tokio::test]
    async fn range_capped_at_100_lines() {
        let content = (1..=300).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let (_tmp, tool) = fixture(&content);
        let r = call(&tool, json!({"file": "code.rs", "start_line": 1, "end_line": 300})).await;
        assert!(!r.is_error);
        assert_eq!(r.metadata["lines_read"], 100);
        assert_eq!(r.metadata["end_line"], 100);
    }

    #[tokio::test]
    async fn invalid_ranges_rejected() {
        let (_tmp, tool) = fixture("a\n");
        let r = call(&tool, json!({"file": "code.rs", "start_line": 0, "end_line": 5})).await;
        assert!(r.is_error);
        assert!(r.content.contains("start_line"));

        let r = call(&tool, json!({"file": "code.rs", "start_line": 5, "end_line": 2})).await;
        assert!(r.is_error);
        assert!(r.content.contains("end_line"));
    }

    #[tokio::test]
    async fn range_past_eof_is_error() {
        let (_tmp, tool) = fixture("one\ntwo\n");
        let r = call(&tool, json!({"file": "code.rs", "start_line": 10, "end_line": 20})).await;
        assert!(r.is_error);
        assert!(r.content.contains("File has 2 lines"));
    }

    #[tokio::test]
    async fn directory_refused() {
        let (_tmp, tool) = fixture("x\n");
        let r = call(&tool, json!({"file": ".", "start_line": 1, "end_line": 5})).await;
        assert!(r.is_error);
        assert!(r.content.contains("directory"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        let outside = tmp.path().join("outside");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("passwd"), "root:x:0:0\n").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("evil")).unwrap();

        let tool = ViewLinesTool::new(Arc::new(Sandbox::new(&root).unwrap()));
        let r = call(&tool, json!({"file": "evil/passwd", "start_line": 1, "end_line": 5})).await;
        assert!(r.is_error);
        assert!(r.content.contains("sandbox"));
    }

    #[tokio::test]
    async fn oversize_file_refused() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("big.bin"), vec![b'x'; 600 * 1024]).unwrap();
        let tool = ViewLinesTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let r = call(&tool, json!({"file": "big.bin", "start_line": 1, "end_line": 10})).await;
        assert!(r.is_error);
        assert!(r.content.contains("too large"));
    }

    #[tokio::test]
    async fn binary_file_refused() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("blob"), b"\x7fELF\x00\x00\x00").unwrap();
        let tool = ViewLinesTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let r = call(&tool, json!({"file": "blob", "start_line": 1, "end_line": 10})).await;
        assert!(r.is_error);
        assert!(r.content.contains("binary"));
    }
}
