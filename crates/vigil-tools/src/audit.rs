//! Append-only audit trail of tool invocations.
//!
//! For a security analyzer the audit trail is non-negotiable: every access
//! the agent makes must be traceable — when, with what parameters, and what
//! came back. One log exists per session; it is never shared across
//! sessions.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::ToolResult;

/// One recorded tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// When the call started.
    pub timestamp: DateTime<Utc>,
    /// Tool name as requested.
    pub tool_name: String,
    /// Parameter snapshot.
    pub params: Map<String, Value>,
    /// The result returned to the loop.
    pub result: ToolResult,
    /// Wall time of the call in milliseconds.
    pub duration_ms: u64,
}

/// Concurrency-safe, append-only invocation log.
///
/// Multiple agents share one log in collaborative mode, so appends are
/// mutex-guarded. Reads return copies — external readers cannot mutate
/// history.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation. Called by the executor after every call,
    /// success or failure.
    pub fn append(&self, entry: AuditEntry) {
        self.entries
            .lock()
            .expect("audit log mutex poisoned")
            .push(entry);
    }

    /// A copy of all entries, in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit log mutex poisoned")
            .clone()
    }

    /// Number of recorded invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit log mutex poisoned").len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(tool: &str) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            tool_name: tool.into(),
            params: json!({"path": "src"}).as_object().unwrap().clone(),
            result: ToolResult::ok("ok"),
            duration_ms: 12,
        }
    }

    #[test]
    fn append_and_read_back() {
        let log = AuditLog::new();
        log.append(entry("directory_tree"));
        log.append(entry("code_search"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tool_name, "directory_tree");
        assert_eq!(entries[1].tool_name, "code_search");
    }

    #[test]
    fn entries_are_copies() {
        let log = AuditLog::new();
        log.append(entry("git_log"));

        let mut snapshot = log.entries();
        snapshot[0].tool_name = "tampered".into();
        snapshot.clear();

        assert_eq!(log.entries()[0].tool_name, "git_log");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn concurrent_appends_all_land() {
        let log = std::sync::Arc::new(AuditLog::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    log.append(entry("view_lines"));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.len(), 400);
    }

    #[test]
    fn entry_serde_roundtrip() {
        let e = entry("find_files");
        let json = serde_json::to_string(&e).unwrap();
        let back: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
