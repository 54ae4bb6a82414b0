//! OpenAI-compatible provider implementing the [`Provider`] trait.
//!
//! One adapter serves every Chat Completions vendor in the registry; the
//! model entry supplies the base URL, pricing, and any extra body fields
//! (e.g. disabling a vendor's thinking mode).

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vigil_core::{Block, CompletionRequest, Message, Role, StreamEvent, ToolSchema};

use crate::models::ModelInfo;
use crate::provider::{EventStream, Provider, ProviderError, ProviderResult};
use crate::sse::parse_sse_lines;

use super::stream_handler::{process_chunk, StreamState};
use super::types::ChatChunk;

/// Event channel depth between the pump task and the consumer.
const PUMP_BUFFER: usize = 64;

/// Chat Completions provider for OpenAI-compatible APIs.
pub struct OpenAiCompatProvider {
    api_key: String,
    model: &'static ModelInfo,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for one model.
    #[must_use]
    pub fn new(api_key: String, model: &'static ModelInfo) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model.id,
            "stream": true,
            "stream_options": {"include_usage": true},
            "messages": convert_messages(&request.system_prompt, &request.messages),
        });
        if request.max_tokens > 0 {
            body["max_completion_tokens"] = json!(request.max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = convert_tools(&request.tools);
        }
        // Vendor-specific extras, e.g. Kimi's thinking switch.
        if let Some(extra) = self.model.extra_params {
            if let Value::Object(extra) = extra() {
                for (key, value) in extra {
                    body[key] = value;
                }
            }
        }
        body
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compat"
    }

    fn model_id(&self) -> &str {
        self.model.id
    }

    fn max_context_tokens(&self) -> u32 {
        self.model.max_context
    }

    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> ProviderResult<EventStream> {
        let body = self.build_body(&request);
        debug!(model = self.model.id, messages = request.messages.len(), "chat completions request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.model.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<StreamEvent>(PUMP_BUFFER);
        let model = self.model;
        let cancel = cancel.clone();

        let _pump = tokio::spawn(async move {
            let mut lines = Box::pin(parse_sse_lines(response.bytes_stream()));
            let mut state = StreamState::new(model);

            loop {
                let data = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        let _ = tx.send(StreamEvent::Error { error: "cancelled".into() }).await;
                        return;
                    }
                    data = lines.next() => data,
                };
                let Some(data) = data else {
                    // [DONE] (filtered by the SSE parser) or transport close:
                    // emit the priced terminal event.
                    let _ = tx.send(state.finish()).await;
                    return;
                };

                let chunk: ChatChunk = match serde_json::from_str(&data) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                for out in process_chunk(&chunk, &mut state) {
                    if tx.send(out).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Translate the transcript into Chat Completions message JSON.
///
/// Tool results become individual `tool`-role messages; assistant tool calls
/// become the `tool_calls` array with JSON-encoded argument strings.
fn convert_messages(system_prompt: &str, messages: &[Message]) -> Value {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len() + 1);

    if !system_prompt.is_empty() {
        out.push(json!({"role": "system", "content": system_prompt}));
    }

    for msg in messages {
        match msg.role {
            Role::User => {
                let tool_results: Vec<&Block> = msg
                    .content
                    .iter()
                    .filter(|b| matches!(b, Block::ToolResult(_)))
                    .collect();

                if tool_results.is_empty() {
                    let text: String = msg
                        .content
                        .iter()
                        .filter_map(|b| match b {
                            Block::Text { text } => Some(text.as_str()),
                            _ => None,
                        })
                        .collect();
                    out.push(json!({"role": "user", "content": text}));
                } else {
                    for block in tool_results {
                        if let Block::ToolResult(tr) = block {
                            out.push(json!({
                                "role": "tool",
                                "tool_call_id": tr.tool_call_id,
                                "content": tr.content,
                            }));
                        }
                    }
                }
            }
            Role::Assistant => {
                let text: String = msg
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        Block::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                let tool_calls: Vec<Value> = msg
                    .tool_calls()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": serde_json::to_string(&tc.arguments)
                                    .unwrap_or_else(|_| "{}".into()),
                            },
                        })
                    })
                    .collect();

                let mut message = json!({"role": "assistant"});
                if !text.is_empty() {
                    message["content"] = json!(text);
                }
                if !tool_calls.is_empty() {
                    message["tool_calls"] = json!(tool_calls);
                }
                out.push(message);
            }
        }
    }

    json!(out)
}

/// Translate tool schemas into Chat Completions function definitions.
fn convert_tools(tools: &[ToolSchema]) -> Value {
    let converted: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.to_json_schema(),
                },
            })
        })
        .collect();
    json!(converted)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vigil_core::messages::ToolResultBlock;
    use vigil_core::{ParamDef, ToolCall};

    fn provider(model: &str) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("sk-test".into(), crate::models::model_info(model).unwrap())
    }

    #[test]
    fn identity() {
        let p = provider("glm-5");
        assert_eq!(p.name(), "openai_compat");
        assert_eq!(p.model_id(), "glm-5");
        assert_eq!(p.max_context_tokens(), 128_000);
    }

    #[test]
    fn system_prompt_becomes_system_message() {
        let converted = convert_messages("Be careful.", &[Message::user_text("hi")]);
        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[0]["content"], "Be careful.");
        assert_eq!(converted[1]["role"], "user");
    }

    #[test]
    fn tool_results_become_tool_role_messages() {
        let messages = vec![Message::tool_results(vec![
            ToolResultBlock {
                tool_call_id: "call_1".into(),
                content: "result one".into(),
                is_error: false,
            },
            ToolResultBlock {
                tool_call_id: "call_2".into(),
                content: "result two".into(),
                is_error: true,
            },
        ])];
        let converted = convert_messages("", &messages);
        assert_eq!(converted[0]["role"], "tool");
        assert_eq!(converted[0]["tool_call_id"], "call_1");
        assert_eq!(converted[1]["tool_call_id"], "call_2");
    }

    #[test]
    fn assistant_tool_calls_use_encoded_arguments() {
        let mut args = serde_json::Map::new();
        let _ = args.insert("count".into(), json!(5));
        let messages = vec![Message::assistant(
            "Checking history.",
            vec![ToolCall::new("call_9", "git_log", args)],
        )];
        let converted = convert_messages("", &messages);
        assert_eq!(converted[0]["role"], "assistant");
        assert_eq!(converted[0]["content"], "Checking history.");
        let call = &converted[0]["tool_calls"][0];
        assert_eq!(call["id"], "call_9");
        assert_eq!(call["function"]["name"], "git_log");
        // Arguments are a JSON string on this wire.
        let args: Value =
            serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["count"], 5);
    }

    #[test]
    fn convert_tools_wraps_function() {
        let mut parameters = BTreeMap::new();
        let _ = parameters.insert("path".to_owned(), ParamDef::string("dir"));
        let tools = vec![ToolSchema {
            name: "directory_tree".into(),
            description: "tree".into(),
            parameters,
            required: vec![],
        }];
        let converted = convert_tools(&tools);
        assert_eq!(converted[0]["type"], "function");
        assert_eq!(converted[0]["function"]["name"], "directory_tree");
        assert_eq!(converted[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn body_carries_stream_options_and_extras() {
        let p = provider("kimi-k2.5");
        let body = p.build_body(&CompletionRequest {
            system_prompt: String::new(),
            messages: vec![],
            tools: vec![],
            max_tokens: 4096,
        });
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_completion_tokens"], 4096);
        // Kimi's registry entry disables thinking.
        assert_eq!(body["thinking"]["type"], "disabled");

        let p = provider("gpt-5.2");
        let body = p.build_body(&CompletionRequest::default());
        assert!(body.get("thinking").is_none());
        assert!(body.get("max_completion_tokens").is_none());
    }
}
