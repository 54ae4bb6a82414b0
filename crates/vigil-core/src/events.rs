//! Event types for agent operation.
//!
//! Two event families:
//!
//! - **[`StreamEvent`]**: low-level provider streaming events (text deltas,
//!   thinking deltas, completed tool calls, terminal done/error). Transient,
//!   never persisted.
//! - **[`RunEvent`]**: runner progress events published to observers through
//!   the session broker, tagged with the emitting agent and a timestamp.
//!
//! [`WireEvent`] is the `(event, data)` pair the downstream boundary (an SSE
//! surface or log sink) consumes; [`RunEvent::to_wire`] performs the mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::messages::{ToolCall, Usage};
use crate::text::truncate_chars;

// ─────────────────────────────────────────────────────────────────────────────
// StreamEvent — provider → runner
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted while streaming one provider completion.
///
/// Ordering contract: text deltas arrive in emission order; each tool call is
/// emitted exactly once, with fully-formed arguments; a single `done` (or an
/// `error` replacing it) ends the stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental response text.
    TextDelta {
        /// Text fragment.
        delta: String,
    },
    /// Incremental thinking/reasoning text (models that surface it).
    ThinkingDelta {
        /// Thinking fragment.
        delta: String,
    },
    /// A fully-parsed tool call.
    ToolCall {
        /// The completed call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
    /// Stream completed; terminal.
    Done {
        /// Final usage, priced by the adapter.
        usage: Usage,
    },
    /// Stream failed; terminal.
    Error {
        /// Error description.
        error: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// RunEvent — runner → observers
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a [`RunEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventType {
    /// Assistant text delta.
    Text,
    /// The model requested a tool.
    ToolCall,
    /// A tool finished (text carries a truncated preview).
    ToolResult,
    /// A finding was persisted.
    FindingRecorded,
    /// The run finished normally (text carries the budget summary).
    Done,
    /// The run failed or was cancelled.
    Error,
    /// A budget dimension was exhausted (text carries the reason).
    BudgetExceeded,
}

/// A structured progress record emitted by the runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    /// Emitting agent (`"single"`, `"agent_a"`, `"agent_b"`).
    pub agent_name: String,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: RunEventType,
    /// Kind-dependent payload text.
    pub text: String,
    /// Tool name for tool events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Full call for `tool_call` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// Whether a tool result was an error.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl RunEvent {
    /// Create an event of the given kind with payload text, stamped now.
    ///
    /// The runner fills `agent_name` when it emits.
    #[must_use]
    pub fn new(event_type: RunEventType, text: impl Into<String>) -> Self {
        Self {
            agent_name: String::new(),
            event_type,
            text: text.into(),
            tool_name: None,
            tool_call: None,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Attach a tool name.
    #[must_use]
    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    /// Attach the full tool call.
    #[must_use]
    pub fn with_call(mut self, call: ToolCall) -> Self {
        self.tool_call = Some(call);
        self
    }

    /// Mark this event as an error result.
    #[must_use]
    pub fn with_error_flag(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

/// Tool-result preview length on the wire.
const WIRE_RESULT_MAX_CHARS: usize = 500;

/// The `(eventName, jsonData)` pair consumed at the downstream boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event name.
    pub event: String,
    /// JSON-encoded payload.
    pub data: String,
}

impl RunEvent {
    /// Map this event onto the boundary wire format.
    ///
    /// Tool results are truncated to 500 characters; error-flagged tool
    /// results map to `tool_error`.
    #[must_use]
    pub fn to_wire(&self) -> WireEvent {
        let tool = self.tool_name.clone().unwrap_or_default();
        let (event, data) = match self.event_type {
            RunEventType::Text => ("thought", json!({"delta": self.text})),
            RunEventType::ToolCall => ("tool_call", json!({"tool": tool})),
            RunEventType::ToolResult => {
                if self.is_error {
                    ("tool_error", json!({"tool": tool, "error": self.text}))
                } else {
                    (
                        "tool_result",
                        json!({
                            "tool": tool,
                            "result": truncate_chars(&self.text, WIRE_RESULT_MAX_CHARS),
                        }),
                    )
                }
            }
            RunEventType::FindingRecorded => ("finding_recorded", json!({"finding": self.text})),
            RunEventType::Done => ("completed", json!({"message": self.text})),
            RunEventType::Error => ("error", json!({"error": self.text})),
            RunEventType::BudgetExceeded => {
                ("budget_exceeded", json!({"reason": self.text}))
            }
        };
        WireEvent {
            event: event.to_owned(),
            data: data.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
