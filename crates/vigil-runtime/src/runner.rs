//! The agent loop.
//!
//! One [`Runner`] drives one agent: it rebuilds the system prompt, calls the
//! provider, consumes the event stream, executes tool calls in order through
//! the executor (or services the runner's own meta-tools), feeds results
//! back, tracks the budget, and publishes progress to the session's event
//! channel. Between turns the order is strictly serial — the next provider
//! call never starts before every tool result of the prior turn is appended.
//!
//! Nothing propagates out of the loop as a fault: recoverable failures
//! become tool-result diagnostics the model can react to; terminal failures
//! become run events and a session status transition.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::messages::ToolResultBlock;
use vigil_core::text::truncate_chars;
use vigil_core::{
    CompletionRequest, Message, ParamDef, RunEvent, RunEventType, StreamEvent, ToolCall,
    ToolResult, ToolSchema, Usage,
};
use vigil_llm::Provider;
use vigil_store::{Finding, InvestigatedArea, SessionStatus, Store};
use vigil_tools::ToolExecutor;

use crate::broker::EventChannel;
use crate::budget::{Budget, BudgetTracker};
use crate::channel::{format_messages, AgentChannel};
use crate::prompt::{build_system_prompt, PromptConfig};

// Special tool names serviced by the runner itself. These are the agent's
// meta-operations; none of them touches the analyzed filesystem.
const TOOL_RECORD_FINDING: &str = "record_finding";
const TOOL_MARK_INVESTIGATED: &str = "mark_investigated";
const TOOL_READ_CHANNEL: &str = "read_channel";
const TOOL_POST_CHANNEL: &str = "post_channel";

/// Transcript length that triggers compaction.
const COMPACTION_THRESHOLD: usize = 30;
/// Trailing messages preserved by compaction (plus the seed message).
const COMPACTION_KEEP_TAIL: usize = 10;

/// Tool-result preview length in `tool_result` run events.
const RESULT_PREVIEW_CHARS: usize = 200;

/// Configuration for one agent instance.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Session this runner belongs to.
    pub session_id: String,
    /// Project under analysis.
    pub project_id: String,
    /// `"single"`, `"agent_a"`, or `"agent_b"`.
    pub agent_name: String,
    /// Fixed user message opening the transcript.
    pub seed_prompt: String,
    /// Max tokens requested per provider call.
    pub max_tokens_per_turn: u32,
    /// Prompt assembly inputs (refreshed from the store each turn).
    pub prompt: PromptConfig,
    /// Resource limits.
    pub budget: Budget,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            project_id: String::new(),
            agent_name: "single".into(),
            seed_prompt: "Begin your security investigation of this project.".into(),
            max_tokens_per_turn: 4096,
            prompt: PromptConfig::default(),
            budget: Budget::default(),
        }
    }
}

/// Executes the agent loop for one agent.
pub struct Runner {
    cfg: RunnerConfig,
    provider: Arc<dyn Provider>,
    executor: Arc<ToolExecutor>,
    store: Arc<dyn Store>,
    channel: Option<AgentChannel>,
    budget: BudgetTracker,
    transcript: Vec<Message>,
}

impl Runner {
    /// Create a runner. The inter-agent channel is `None` in single mode.
    #[must_use]
    pub fn new(
        cfg: RunnerConfig,
        provider: Arc<dyn Provider>,
        executor: Arc<ToolExecutor>,
        store: Arc<dyn Store>,
        channel: Option<AgentChannel>,
    ) -> Self {
        let budget = BudgetTracker::new(cfg.budget);
        let seed = Message::user_text(cfg.seed_prompt.clone());
        Self {
            cfg,
            provider,
            executor,
            store,
            channel,
            budget,
            transcript: vec![seed],
        }
    }

    /// Run the loop to completion, publishing progress into `events`.
    ///
    /// The channel is closed when the run terminates, whatever the reason.
    pub async fn run(mut self, cancel: CancellationToken, events: Arc<EventChannel>) {
        self.run_inner(&cancel, &events).await;
        events.close();
    }

    #[allow(clippy::too_many_lines)]
    async fn run_inner(&mut self, cancel: &CancellationToken, events: &EventChannel) {
        loop {
            // 1. Cancellation gate.
            if cancel.is_cancelled() {
                self.emit(events, RunEvent::new(RunEventType::Error, "cancelled"));
                self.set_status(SessionStatus::Cancelled).await;
                return;
            }

            // 2. Budget gate.
            if let Some(reason) = self.budget.exceeded() {
                self.emit(events, RunEvent::new(RunEventType::BudgetExceeded, reason));
                self.set_status(SessionStatus::Completed).await;
                return;
            }

            // 3. Build the request. The prompt is rebuilt from the store so
            // findings and coverage recorded in earlier turns are reflected.
            let request = CompletionRequest {
                system_prompt: build_system_prompt(&self.refreshed_prompt_config().await),
                messages: self.transcript.clone(),
                tools: self.tool_schemas(),
                max_tokens: self.cfg.max_tokens_per_turn,
            };

            // 4. Call the provider.
            let mut stream = match self.provider.complete(cancel, request).await {
                Ok(s) => s,
                Err(e) => {
                    self.emit(
                        events,
                        RunEvent::new(RunEventType::Error, format!("provider error: {e}")),
                    );
                    self.set_status(SessionStatus::Failed).await;
                    return;
                }
            };

            // 5. Consume the stream.
            let mut assistant_text = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            let mut usage: Option<Usage> = None;
            let mut stream_error = false;

            while let Some(event) = stream.next().await {
                match event {
                    StreamEvent::TextDelta { delta } => {
                        assistant_text.push_str(&delta);
                        self.emit(events, RunEvent::new(RunEventType::Text, delta));
                    }
                    StreamEvent::ThinkingDelta { .. } => {
                        // Reasoning streams are not part of the transcript.
                    }
                    StreamEvent::ToolCall { tool_call } => {
                        self.emit(
                            events,
                            RunEvent::new(RunEventType::ToolCall, "")
                                .with_tool(tool_call.name.clone())
                                .with_call(tool_call.clone()),
                        );
                        tool_calls.push(tool_call);
                    }
                    StreamEvent::Done { usage: u } => usage = Some(u),
                    StreamEvent::Error { error } => {
                        self.emit(events, RunEvent::new(RunEventType::Error, error));
                        stream_error = true;
                    }
                }
            }

            if stream_error {
                let status = if cancel.is_cancelled() {
                    SessionStatus::Cancelled
                } else {
                    SessionStatus::Failed
                };
                self.set_status(status).await;
                return;
            }

            let Some(usage) = usage else {
                // The stream closed without a terminal event: transport
                // truncation. Treat like a provider failure.
                self.emit(
                    events,
                    RunEvent::new(RunEventType::Error, "provider stream ended unexpectedly"),
                );
                self.set_status(SessionStatus::Failed).await;
                return;
            };

            // 6. Record usage; persist session cost best-effort.
            self.budget.record(
                usage.input_tokens,
                usage.output_tokens,
                usage.cost_usd,
                u32::try_from(tool_calls.len()).unwrap_or(u32::MAX),
            );
            if let Err(e) = self
                .store
                .update_session_cost(&self.cfg.session_id, usage.cost_usd)
                .await
            {
                warn!(error = %e, "failed to persist session cost");
            }

            // 7. Append the assistant message.
            self.transcript
                .push(Message::assistant(&assistant_text, tool_calls.clone()));

            // 8. No tool calls: the model has concluded.
            if tool_calls.is_empty() {
                self.emit(
                    events,
                    RunEvent::new(RunEventType::Done, self.budget.summary()),
                );
                self.set_status(SessionStatus::Completed).await;
                return;
            }

            // 9. Execute each tool call, strictly in call order.
            let mut results: Vec<ToolResultBlock> = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                let result = self.execute_tool(call, events).await;
                results.push(ToolResultBlock {
                    tool_call_id: call.id.clone(),
                    content: result.content,
                    is_error: result.is_error,
                });
            }

            // 10. One user message carries all results, preserving order.
            self.transcript.push(Message::tool_results(results));

            self.compact_transcript();
        }
    }

    /// Dispatch one tool call: runner meta-tools are handled here, all other
    /// names go to the executor. Both paths share the result contract, so
    /// the loop treats them uniformly.
    async fn execute_tool(&self, call: &ToolCall, events: &EventChannel) -> ToolResult {
        match call.name.as_str() {
            TOOL_RECORD_FINDING => self.handle_record_finding(&call.arguments, events).await,
            TOOL_MARK_INVESTIGATED => self.handle_mark_investigated(&call.arguments).await,
            TOOL_READ_CHANNEL => self.handle_read_channel().await,
            TOOL_POST_CHANNEL => self.handle_post_channel(&call.arguments).await,
            _ => {
                let result = self
                    .executor
                    .execute(&call.name, call.arguments.clone())
                    .await;
                self.emit(
                    events,
                    RunEvent::new(
                        RunEventType::ToolResult,
                        truncate_chars(&result.content, RESULT_PREVIEW_CHARS),
                    )
                    .with_tool(call.name.clone())
                    .with_error_flag(result.is_error),
                );
                result
            }
        }
    }

    /// Validate and persist a finding, deduplicating on
    /// `(project, location, title)`.
    async fn handle_record_finding(
        &self,
        params: &Map<String, Value>,
        events: &EventChannel,
    ) -> ToolResult {
        let get = |key: &str| params.get(key).and_then(Value::as_str).unwrap_or("");
        let (title, location, description) = (get("title"), get("location"), get("description"));
        let (severity, confidence) = (get("severity"), get("confidence"));

        if title.is_empty() || location.is_empty() || description.is_empty() {
            return ToolResult::error("record_finding requires title, location, and description");
        }

        match self
            .store
            .finding_exists(&self.cfg.project_id, location, title)
            .await
        {
            Ok(true) => {
                return ToolResult::ok(format!(
                    "duplicate finding: {title:?} at {location} already exists"
                ));
            }
            Ok(false) => {}
            Err(e) => return ToolResult::error(format!("error checking duplicates: {e}")),
        }

        let mut finding = Finding {
            id: String::new(),
            session_id: self.cfg.session_id.clone(),
            project_id: self.cfg.project_id.clone(),
            title: title.to_owned(),
            location: location.to_owned(),
            category: get("category").to_owned(),
            severity: severity.to_owned(),
            confidence: confidence.to_owned(),
            description: description.to_owned(),
            data_flow: get("data_flow").to_owned(),
            found_by: self.cfg.agent_name.clone(),
            created_at: chrono::Utc::now(),
        };

        if let Err(e) = self.store.create_finding(&mut finding).await {
            return ToolResult::error(format!("error recording finding: {e}"));
        }

        self.emit(
            events,
            RunEvent::new(
                RunEventType::FindingRecorded,
                format!("[{severity}] {title} @ {location}"),
            ),
        );
        ToolResult::ok(format!("Finding recorded: {title} (severity: {severity})"))
    }

    /// Record coverage so later sessions skip this area.
    async fn handle_mark_investigated(&self, params: &Map<String, Value>) -> ToolResult {
        let path = params.get("path").and_then(Value::as_str).unwrap_or("");
        let pattern = params.get("pattern").and_then(Value::as_str).unwrap_or("");
        if path.is_empty() || pattern.is_empty() {
            return ToolResult::error("mark_investigated requires path and pattern");
        }

        let mut area = InvestigatedArea {
            id: String::new(),
            project_id: self.cfg.project_id.clone(),
            session_id: self.cfg.session_id.clone(),
            path: path.to_owned(),
            pattern: pattern.to_owned(),
            agent: self.cfg.agent_name.clone(),
        };
        if let Err(e) = self.store.mark_investigated(&mut area).await {
            return ToolResult::error(format!("error marking investigated: {e}"));
        }
        ToolResult::ok(format!("Marked as investigated: {path} ({pattern})"))
    }

    /// Poll the partner channel; consumed messages are marked read.
    async fn handle_read_channel(&self) -> ToolResult {
        let Some(channel) = &self.channel else {
            return ToolResult::error("channel not available in single mode");
        };
        match channel.poll(&self.cfg.agent_name).await {
            Ok(messages) => ToolResult::ok(format_messages(&messages)),
            Err(e) => ToolResult::error(format!("error reading channel: {e}")),
        }
    }

    /// Post a message to the partner agent.
    async fn handle_post_channel(&self, params: &Map<String, Value>) -> ToolResult {
        let Some(channel) = &self.channel else {
            return ToolResult::error("channel not available in single mode");
        };
        let msg_type = params.get("msg_type").and_then(Value::as_str).unwrap_or("");
        let content = params.get("content").and_then(Value::as_str).unwrap_or("");
        if msg_type.is_empty() || content.is_empty() {
            return ToolResult::error("post_channel requires msg_type and content");
        }

        let to_agent = if self.cfg.agent_name == "agent_b" {
            "agent_a"
        } else {
            "agent_b"
        };
        match channel
            .post(&self.cfg.agent_name, to_agent, msg_type, content)
            .await
        {
            Ok(()) => ToolResult::ok(format!("Message posted to {to_agent} ({msg_type})")),
            Err(e) => ToolResult::error(format!("error posting to channel: {e}")),
        }
    }

    /// Refresh finding titles and coverage from the store so the per-turn
    /// prompt reflects state accumulated during this run. Store failures
    /// fall back to the configured lists.
    async fn refreshed_prompt_config(&self) -> PromptConfig {
        let mut prompt = self.cfg.prompt.clone();

        match self.store.list_findings(&self.cfg.project_id).await {
            Ok(findings) => {
                prompt.previous_findings = findings.into_iter().map(|f| f.title).collect();
            }
            Err(e) => debug!(error = %e, "finding refresh failed, using configured list"),
        }
        match self.store.investigated_areas(&self.cfg.project_id).await {
            Ok(areas) => {
                prompt.investigated_areas = areas
                    .into_iter()
                    .map(|a| format!("{}: {}", a.path, a.pattern))
                    .collect();
            }
            Err(e) => debug!(error = %e, "coverage refresh failed, using configured list"),
        }
        prompt
    }

    /// Executor tools plus the runner's meta-tools; the channel pair is
    /// offered only in collaborative mode.
    fn tool_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas = self.executor.schemas();

        let mut finding_params = BTreeMap::new();
        let _ = finding_params.insert(
            "title".to_owned(),
            ParamDef::string("Clear, descriptive title for the finding"),
        );
        let _ = finding_params.insert(
            "location".to_owned(),
            ParamDef::string("file:line or file:function where the vulnerability exists"),
        );
        let _ = finding_params.insert(
            "severity".to_owned(),
            ParamDef::string("critical|high|medium|low|info"),
        );
        let _ = finding_params.insert(
            "confidence".to_owned(),
            ParamDef::string("confirmed|likely|suspected"),
        );
        let _ = finding_params.insert(
            "description".to_owned(),
            ParamDef::string("Detailed description of the vulnerability"),
        );
        let _ = finding_params.insert(
            "data_flow".to_owned(),
            ParamDef::string("How to trigger the vulnerability (attack vector)"),
        );
        let _ = finding_params.insert(
            "category".to_owned(),
            ParamDef::string("CWE ID or custom category"),
        );
        schemas.push(ToolSchema {
            name: TOOL_RECORD_FINDING.to_owned(),
            description: "Record a confirmed vulnerability finding to persistent storage."
                .to_owned(),
            parameters: finding_params,
            required: vec![
                "title".into(),
                "location".into(),
                "severity".into(),
                "confidence".into(),
                "description".into(),
            ],
        });

        let mut area_params = BTreeMap::new();
        let _ = area_params.insert(
            "path".to_owned(),
            ParamDef::string("File or directory path that was investigated"),
        );
        let _ = area_params.insert(
            "pattern".to_owned(),
            ParamDef::string("What was looked for (e.g., 'SQL injection patterns')"),
        );
        schemas.push(ToolSchema {
            name: TOOL_MARK_INVESTIGATED.to_owned(),
            description:
                "Mark a code area as investigated to avoid redundant analysis in future sessions."
                    .to_owned(),
            parameters: area_params,
            required: vec!["path".into(), "pattern".into()],
        });

        if self.channel.is_some() {
            schemas.push(ToolSchema {
                name: TOOL_READ_CHANNEL.to_owned(),
                description:
                    "Read unread messages from your partner agent. Call every ~8 tool invocations."
                        .to_owned(),
                parameters: BTreeMap::new(),
                required: vec![],
            });

            let mut post_params = BTreeMap::new();
            let _ = post_params.insert(
                "msg_type".to_owned(),
                ParamDef::string("finding|question|context|duplicate"),
            );
            let _ = post_params.insert(
                "content".to_owned(),
                ParamDef::string("Message content to send"),
            );
            schemas.push(ToolSchema {
                name: TOOL_POST_CHANNEL.to_owned(),
                description: "Send a message to your partner agent.".to_owned(),
                parameters: post_params,
                required: vec!["msg_type".into(), "content".into()],
            });
        }

        schemas
    }

    /// Drop the transcript's middle once it grows past the threshold. The
    /// first message carries the seed intent; the tail carries the freshest
    /// context.
    fn compact_transcript(&mut self) {
        if self.transcript.len() <= COMPACTION_THRESHOLD {
            return;
        }
        let dropped = self.transcript.len() - 1 - COMPACTION_KEEP_TAIL;
        let tail = self
            .transcript
            .split_off(self.transcript.len() - COMPACTION_KEEP_TAIL);
        self.transcript.truncate(1);
        self.transcript.extend(tail);
        info!(
            agent = %self.cfg.agent_name,
            dropped,
            kept = self.transcript.len(),
            "transcript compacted"
        );
    }

    fn emit(&self, events: &EventChannel, mut event: RunEvent) {
        event.agent_name.clone_from(&self.cfg.agent_name);
        events.publish(event);
    }

    async fn set_status(&self, status: SessionStatus) {
        if let Err(e) = self
            .store
            .update_session_status(&self.cfg.session_id, status)
            .await
        {
            warn!(error = %e, status = status.as_str(), "failed to persist session status");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
