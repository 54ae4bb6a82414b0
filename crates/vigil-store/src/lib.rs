//! # vigil-store
//!
//! Persistence for the analyzer: projects, sessions, findings, investigated
//! areas, and the inter-agent channel. The runtime sees only the [`Store`]
//! trait; [`SqliteStore`] is the shipped implementation.
//!
//! Findings are unique per `(project, location, title)`; investigated areas
//! are unique per `(project, path, pattern)` with duplicate inserts treated
//! as no-ops.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("store: {0}")]
    Database(#[from] rusqlite::Error),

    /// A looked-up row does not exist.
    #[error("store: {entity} {key:?} not found")]
    NotFound {
        /// Entity kind (`"project"`, `"session"`).
        entity: &'static str,
        /// Lookup key.
        key: String,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Domain types
// ─────────────────────────────────────────────────────────────────────────────

/// An analyzed repository.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    /// Row ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Absolute root path of the analyzed tree.
    pub root_path: String,
    /// JSON blob: scope, focus, bounty program.
    pub config: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Session lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// In progress.
    Running,
    /// Finished normally (including budget exhaustion).
    Completed,
    /// Terminated by a provider/stream failure.
    Failed,
    /// Terminated by cancellation.
    Cancelled,
}

impl SessionStatus {
    /// Stable string form stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One analysis run.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// Row ID.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Model for the (first) agent.
    pub model_a: String,
    /// Model for the second agent in collaborative mode.
    pub model_b: Option<String>,
    /// `"single"` or `"collaborative"`.
    pub mode: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, once terminal.
    pub ended_at: Option<DateTime<Utc>>,
    /// Accumulated cost in USD.
    pub total_cost_usd: f64,
}

/// A recorded vulnerability.
#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    /// Row ID.
    pub id: String,
    /// Session that produced it.
    pub session_id: String,
    /// Owning project.
    pub project_id: String,
    /// Title (dedup key component).
    pub title: String,
    /// `file:line` or `file:function` (dedup key component).
    pub location: String,
    /// CWE ID or custom category.
    pub category: String,
    /// critical | high | medium | low | info.
    pub severity: String,
    /// confirmed | likely | suspected.
    pub confidence: String,
    /// What the vulnerability is and why it matters.
    pub description: String,
    /// How to trigger it.
    pub data_flow: String,
    /// Agent that found it.
    pub found_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A `(path, pattern)` pair marked as already analyzed.
#[derive(Clone, Debug, PartialEq)]
pub struct InvestigatedArea {
    /// Row ID.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Session that marked it.
    pub session_id: String,
    /// File or directory path.
    pub path: String,
    /// What was looked for.
    pub pattern: String,
    /// Agent that marked it.
    pub agent: String,
}

/// An inter-agent note in collaborative mode.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelMessage {
    /// Row ID.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Sender agent.
    pub from_agent: String,
    /// Addressee agent.
    pub to_agent: String,
    /// finding | question | context | duplicate.
    pub msg_type: String,
    /// Message body.
    pub content: String,
    /// Consumed flag.
    pub read: bool,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store trait
// ─────────────────────────────────────────────────────────────────────────────

/// Persistence operations the runtime depends on.
///
/// All methods are best-effort from the runner's perspective: a store
/// failure degrades to a tool-result diagnostic or a log line, never a
/// crashed run.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a project; assigns an ID when empty.
    async fn create_project(&self, project: &mut Project) -> StoreResult<()>;
    /// Fetch a project by ID.
    async fn get_project(&self, id: &str) -> StoreResult<Project>;
    /// Fetch a project by root path.
    async fn get_project_by_path(&self, root_path: &str) -> StoreResult<Project>;
    /// All projects, newest first.
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;

    /// Insert a session; assigns an ID when empty.
    async fn create_session(&self, session: &mut Session) -> StoreResult<()>;
    /// Update status; terminal statuses also stamp `ended_at`.
    async fn update_session_status(&self, id: &str, status: SessionStatus) -> StoreResult<()>;
    /// Add to the session's accumulated cost.
    async fn update_session_cost(&self, id: &str, delta_usd: f64) -> StoreResult<()>;

    /// Insert a finding; assigns an ID when empty.
    async fn create_finding(&self, finding: &mut Finding) -> StoreResult<()>;
    /// All findings for a project, newest first.
    async fn list_findings(&self, project_id: &str) -> StoreResult<Vec<Finding>>;
    /// Whether a finding with this dedup key exists.
    async fn finding_exists(
        &self,
        project_id: &str,
        location: &str,
        title: &str,
    ) -> StoreResult<bool>;

    /// Record an investigated area. Duplicate `(project, path, pattern)`
    /// inserts are no-ops.
    async fn mark_investigated(&self, area: &mut InvestigatedArea) -> StoreResult<()>;
    /// All investigated areas for a project.
    async fn investigated_areas(&self, project_id: &str) -> StoreResult<Vec<InvestigatedArea>>;

    /// Post an inter-agent message.
    async fn post_message(&self, message: &mut ChannelMessage) -> StoreResult<()>;
    /// Unread messages addressed to an agent, oldest first.
    async fn poll_messages(
        &self,
        session_id: &str,
        to_agent: &str,
    ) -> StoreResult<Vec<ChannelMessage>>;
    /// Mark all messages addressed to an agent as read.
    async fn mark_messages_read(&self, session_id: &str, to_agent: &str) -> StoreResult<()>;
}
