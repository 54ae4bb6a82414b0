//! Collaborative mode — two agents over one sandbox.
//!
//! Both runners share the executor, store, and budget configuration but keep
//! their own providers, prompts, and transcripts. They communicate only
//! through the store-backed channel, so neither holds a reference to the
//! other. Their event streams are merged into one channel without total
//! ordering across agents — every event is tagged with its `agent_name`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use vigil_llm::Provider;
use vigil_store::Store;
use vigil_tools::ToolExecutor;

use crate::broker::EventChannel;
use crate::budget::Budget;
use crate::channel::AgentChannel;
use crate::prompt::PromptConfig;
use crate::runner::{Runner, RunnerConfig};

/// Configuration for a collaborative session.
pub struct CollabConfig {
    /// Session ID shared by both agents.
    pub session_id: String,
    /// Project under analysis.
    pub project_id: String,
    /// Provider for agent A.
    pub provider_a: Arc<dyn Provider>,
    /// Provider for agent B.
    pub provider_b: Arc<dyn Provider>,
    /// Agent A's investigation focus.
    pub focus_a: String,
    /// Agent B's investigation focus.
    pub focus_b: String,
    /// Shared tool executor (one sandbox, one audit log).
    pub executor: Arc<ToolExecutor>,
    /// Shared store.
    pub store: Arc<dyn Store>,
    /// Budget applied to each agent independently.
    pub budget: Budget,
    /// Prompt fields common to both agents (mode/focus/partner are set per
    /// agent).
    pub prompt_base: PromptConfig,
    /// Seed user message for both transcripts.
    pub seed_prompt: String,
    /// Max tokens per provider call.
    pub max_tokens_per_turn: u32,
}

/// Start both agents and return the merged event channel.
///
/// The merged channel closes when both agents have finished.
#[must_use]
pub fn run_collaborative(cancel: CancellationToken, cfg: CollabConfig) -> Arc<EventChannel> {
    let channel = AgentChannel::new(cfg.store.clone(), cfg.session_id.clone());

    let mut prompt_a = cfg.prompt_base.clone();
    prompt_a.mode = "agent_a".into();
    prompt_a.focus.clone_from(&cfg.focus_a);
    prompt_a.partner_model = Some(cfg.provider_b.model_id().to_owned());

    let mut prompt_b = cfg.prompt_base.clone();
    prompt_b.mode = "agent_b".into();
    prompt_b.focus.clone_from(&cfg.focus_b);
    prompt_b.partner_model = Some(cfg.provider_a.model_id().to_owned());

    let runner_a = Runner::new(
        RunnerConfig {
            session_id: cfg.session_id.clone(),
            project_id: cfg.project_id.clone(),
            agent_name: "agent_a".into(),
            seed_prompt: cfg.seed_prompt.clone(),
            max_tokens_per_turn: cfg.max_tokens_per_turn,
            prompt: prompt_a,
            budget: cfg.budget,
        },
        cfg.provider_a,
        cfg.executor.clone(),
        cfg.store.clone(),
        Some(channel.clone()),
    );

    let runner_b = Runner::new(
        RunnerConfig {
            session_id: cfg.session_id.clone(),
            project_id: cfg.project_id,
            agent_name: "agent_b".into(),
            seed_prompt: cfg.seed_prompt,
            max_tokens_per_turn: cfg.max_tokens_per_turn,
            prompt: prompt_b,
            budget: cfg.budget,
        },
        cfg.provider_b,
        cfg.executor,
        cfg.store,
        Some(channel),
    );

    let merged = Arc::new(EventChannel::new());
    let events_a = Arc::new(EventChannel::new());
    let events_b = Arc::new(EventChannel::new());

    let run_a = tokio::spawn(runner_a.run(cancel.clone(), events_a.clone()));
    let run_b = tokio::spawn(runner_b.run(cancel, events_b.clone()));

    let forward = |source: Arc<EventChannel>, sink: Arc<EventChannel>| async move {
        while let Some(event) = source.recv().await {
            sink.publish(event);
        }
    };

    let fwd_a = tokio::spawn(forward(events_a, merged.clone()));
    let fwd_b = tokio::spawn(forward(events_b, merged.clone()));

    let session_id = cfg.session_id;
    let merged_for_close = merged.clone();
    let _supervisor = tokio::spawn(async move {
        let _ = run_a.await;
        let _ = run_b.await;
        let _ = fwd_a.await;
        let _ = fwd_b.await;
        info!(session_id, "collaborative session finished");
        merged_for_close.close();
    });

    merged
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
