//! Chat Completions streaming chunk types.
//!
//! Only the fields the stream handler consumes are modeled.

use serde::Deserialize;

/// One streamed completion chunk.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatChunk {
    /// Choice deltas (one choice in practice).
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Present on the final chunk when `include_usage` is requested.
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
}

/// One choice within a chunk.
#[derive(Clone, Debug, Deserialize)]
pub struct ChunkChoice {
    /// Incremental content.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Why the choice finished, on its last chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta payload of a choice.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkDelta {
    /// Response text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning text fragment (thinking-capable compatible vendors).
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Tool-call fragments, keyed by `index` across chunks.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A fragment of one streaming tool call.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolCallDelta {
    /// Stable index correlating fragments of the same call.
    #[serde(default)]
    pub index: u32,
    /// Call ID (first fragment only).
    #[serde(default)]
    pub id: Option<String>,
    /// Function name/argument fragments.
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Function fragment within a tool-call delta.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FunctionDelta {
    /// Function name (first fragment only).
    #[serde(default)]
    pub name: Option<String>,
    /// Partial JSON arguments.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage on the final chunk.
#[derive(Clone, Debug, Deserialize)]
pub struct ChunkUsage {
    /// Input tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Output tokens.
    #[serde(default)]
    pub completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_chunk() {
        let raw = r#"{"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk: ChatChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
    }

    #[test]
    fn parses_tool_call_fragment() {
        let raw = r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"code_search","arguments":"{\"pa"}}]},"finish_reason":null}]}"#;
        let chunk: ChatChunk = serde_json::from_str(raw).unwrap();
        let tc = &chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.id.as_deref(), Some("call_1"));
        assert_eq!(tc.function.as_ref().unwrap().name.as_deref(), Some("code_search"));
    }

    #[test]
    fn parses_usage_only_chunk() {
        let raw = r#"{"choices":[],"usage":{"prompt_tokens":321,"completion_tokens":45}}"#;
        let chunk: ChatChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(chunk.usage.unwrap().prompt_tokens, 321);
    }

    #[test]
    fn parses_reasoning_content() {
        let raw = r#"{"choices":[{"index":0,"delta":{"reasoning_content":"thinking..."},"finish_reason":null}]}"#;
        let chunk: ChatChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(
            chunk.choices[0].delta.reasoning_content.as_deref(),
            Some("thinking...")
        );
    }
}
