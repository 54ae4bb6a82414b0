//! Anthropic SSE wire types.
//!
//! Only the fields the stream handler consumes are modeled; everything else
//! in the vendor payload is ignored by serde.

use serde::Deserialize;

/// One Anthropic SSE event, discriminated by `type`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicSseEvent {
    /// Message opened; carries input-token usage.
    MessageStart {
        /// Envelope with usage.
        message: SseMessage,
    },
    /// A content block opened.
    ContentBlockStart {
        /// Block index within the message.
        index: u32,
        /// The opened block.
        content_block: SseContentBlock,
    },
    /// Incremental content for the current block.
    ContentBlockDelta {
        /// Block index within the message.
        index: u32,
        /// The delta payload.
        delta: SseDelta,
    },
    /// The current block is complete.
    ContentBlockStop {
        /// Block index within the message.
        index: u32,
    },
    /// Message-level delta; carries stop reason and output tokens.
    MessageDelta {
        /// Stop-reason delta.
        delta: SseMessageDelta,
        /// Output-token usage so far.
        usage: Option<SseUsageDelta>,
    },
    /// Message complete.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// Vendor-reported error.
    Error {
        /// Error payload.
        error: SseError,
    },
}

/// Message envelope in `message_start`.
#[derive(Clone, Debug, Deserialize)]
pub struct SseMessage {
    /// Usage at stream open (input side).
    pub usage: SseUsage,
}

/// Usage block in `message_start`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SseUsage {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens (usually 0 at start).
    #[serde(default)]
    pub output_tokens: u64,
}

/// Usage block in `message_delta`.
#[derive(Clone, Debug, Deserialize)]
pub struct SseUsageDelta {
    /// Output tokens generated so far.
    #[serde(default)]
    pub output_tokens: u64,
}

/// Stop-reason delta in `message_delta`.
#[derive(Clone, Debug, Deserialize)]
pub struct SseMessageDelta {
    /// Why the model stopped, when known.
    pub stop_reason: Option<String>,
}

/// A content block opened by `content_block_start`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseContentBlock {
    /// Response text.
    Text {
        /// Initial text (empty in practice).
        #[serde(default)]
        text: String,
    },
    /// Extended thinking.
    Thinking {
        /// Initial thinking text.
        #[serde(default)]
        thinking: String,
    },
    /// A tool invocation; arguments stream separately as JSON fragments.
    ToolUse {
        /// Tool call ID.
        id: String,
        /// Tool name.
        name: String,
    },
}

/// A delta inside `content_block_delta`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseDelta {
    /// Text fragment.
    TextDelta {
        /// The fragment.
        text: String,
    },
    /// Thinking fragment.
    ThinkingDelta {
        /// The fragment.
        thinking: String,
    },
    /// Thinking signature fragment (ignored).
    SignatureDelta {
        /// The fragment.
        signature: String,
    },
    /// Partial JSON of the current tool call's arguments.
    InputJsonDelta {
        /// The JSON fragment.
        partial_json: String,
    },
}

/// Vendor error payload.
#[derive(Clone, Debug, Deserialize)]
pub struct SseError {
    /// Error type token (`overloaded_error`, ...).
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
}
