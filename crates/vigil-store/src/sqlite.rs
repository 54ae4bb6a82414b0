//! SQLite implementation of the [`Store`] trait.
//!
//! A single mutex-guarded connection: the write load here is a handful of
//! rows per turn, and the local database is the only consumer. Uniqueness
//! is enforced in the schema — findings on `(project_id, location, title)`,
//! investigated areas on `(project_id, path, pattern)` with `OR IGNORE`
//! insert semantics.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::{
    ChannelMessage, Finding, InvestigatedArea, Project, Session, SessionStatus, Store, StoreError,
    StoreResult,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    root_path   TEXT NOT NULL UNIQUE,
    config      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id             TEXT PRIMARY KEY,
    project_id     TEXT NOT NULL REFERENCES projects(id),
    model_a        TEXT NOT NULL,
    model_b        TEXT,
    mode           TEXT NOT NULL,
    status         TEXT NOT NULL,
    started_at     TEXT NOT NULL,
    ended_at       TEXT,
    total_cost_usd REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS findings (
    id          TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES sessions(id),
    project_id  TEXT NOT NULL REFERENCES projects(id),
    title       TEXT NOT NULL,
    location    TEXT NOT NULL,
    category    TEXT NOT NULL DEFAULT '',
    severity    TEXT NOT NULL DEFAULT '',
    confidence  TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL,
    data_flow   TEXT NOT NULL DEFAULT '',
    found_by    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE(project_id, location, title)
);

CREATE TABLE IF NOT EXISTS investigated_areas (
    id          TEXT PRIMARY KEY,
    project_id  TEXT NOT NULL REFERENCES projects(id),
    session_id  TEXT NOT NULL REFERENCES sessions(id),
    path        TEXT NOT NULL,
    pattern     TEXT NOT NULL,
    agent       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE(project_id, path, pattern)
);

CREATE TABLE IF NOT EXISTS channel_messages (
    id          TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES sessions(id),
    from_agent  TEXT NOT NULL,
    to_agent    TEXT NOT NULL,
    msg_type    TEXT NOT NULL,
    content     TEXT NOT NULL,
    read        INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests and ephemeral runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }
}

fn ensure_id(id: &mut String) {
    if id.is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        root_path: row.get(2)?,
        config: row.get(3)?,
        created_at: parse_ts(&row.get::<_, String>(4)?),
    })
}

fn finding_from_row(row: &Row<'_>) -> rusqlite::Result<Finding> {
    Ok(Finding {
        id: row.get(0)?,
        session_id: row.get(1)?,
        project_id: row.get(2)?,
        title: row.get(3)?,
        location: row.get(4)?,
        category: row.get(5)?,
        severity: row.get(6)?,
        confidence: row.get(7)?,
        description: row.get(8)?,
        data_flow: row.get(9)?,
        found_by: row.get(10)?,
        created_at: parse_ts(&row.get::<_, String>(11)?),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_project(&self, project: &mut Project) -> StoreResult<()> {
        ensure_id(&mut project.id);
        project.created_at = Utc::now();
        let _ = self.lock().execute(
            "INSERT INTO projects (id, name, root_path, config, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.id,
                project.name,
                project.root_path,
                project.config,
                project.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get_project(&self, id: &str) -> StoreResult<Project> {
        self.lock()
            .query_row(
                "SELECT id, name, root_path, config, created_at FROM projects WHERE id = ?1",
                params![id],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "project",
                key: id.to_owned(),
            })
    }

    async fn get_project_by_path(&self, root_path: &str) -> StoreResult<Project> {
        self.lock()
            .query_row(
                "SELECT id, name, root_path, config, created_at FROM projects WHERE root_path = ?1",
                params![root_path],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "project",
                key: root_path.to_owned(),
            })
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, root_path, config, created_at FROM projects ORDER BY created_at DESC",
        )?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    async fn create_session(&self, session: &mut Session) -> StoreResult<()> {
        ensure_id(&mut session.id);
        session.started_at = Utc::now();
        let _ = self.lock().execute(
            "INSERT INTO sessions (id, project_id, model_a, model_b, mode, status, started_at, total_cost_usd)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                session.project_id,
                session.model_a,
                session.model_b,
                session.mode,
                session.status.as_str(),
                session.started_at.to_rfc3339(),
                session.total_cost_usd,
            ],
        )?;
        Ok(())
    }

    async fn update_session_status(&self, id: &str, status: SessionStatus) -> StoreResult<()> {
        let ended_at = match status {
            SessionStatus::Running => None,
            _ => Some(Utc::now().to_rfc3339()),
        };
        let _ = self.lock().execute(
            "UPDATE sessions SET status = ?1, ended_at = ?2 WHERE id = ?3",
            params![status.as_str(), ended_at, id],
        )?;
        Ok(())
    }

    async fn update_session_cost(&self, id: &str, delta_usd: f64) -> StoreResult<()> {
        let _ = self.lock().execute(
            "UPDATE sessions SET total_cost_usd = total_cost_usd + ?1 WHERE id = ?2",
            params![delta_usd, id],
        )?;
        Ok(())
    }

    async fn create_finding(&self, finding: &mut Finding) -> StoreResult<()> {
        ensure_id(&mut finding.id);
        finding.created_at = Utc::now();
        let _ = self.lock().execute(
            "INSERT INTO findings (id, session_id, project_id, title, location, category,
                                   severity, confidence, description, data_flow, found_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                finding.id,
                finding.session_id,
                finding.project_id,
                finding.title,
                finding.location,
                finding.category,
                finding.severity,
                finding.confidence,
                finding.description,
                finding.data_flow,
                finding.found_by,
                finding.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_findings(&self, project_id: &str) -> StoreResult<Vec<Finding>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, project_id, title, location, category, severity,
                    confidence, description, data_flow, found_by, created_at
             FROM findings WHERE project_id = ?1 ORDER BY created_at DESC",
        )?;
        let findings = stmt
            .query_map(params![project_id], finding_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(findings)
    }

    async fn finding_exists(
        &self,
        project_id: &str,
        location: &str,
        title: &str,
    ) -> StoreResult<bool> {
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM findings WHERE project_id = ?1 AND location = ?2 AND title = ?3",
            params![project_id, location, title],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn mark_investigated(&self, area: &mut InvestigatedArea) -> StoreResult<()> {
        ensure_id(&mut area.id);
        let _ = self.lock().execute(
            "INSERT OR IGNORE INTO investigated_areas
                 (id, project_id, session_id, path, pattern, agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                area.id,
                area.project_id,
                area.session_id,
                area.path,
                area.pattern,
                area.agent,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn investigated_areas(&self, project_id: &str) -> StoreResult<Vec<InvestigatedArea>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, project_id, session_id, path, pattern, agent
             FROM investigated_areas WHERE project_id = ?1 ORDER BY created_at",
        )?;
        let areas = stmt
            .query_map(params![project_id], |row| {
                Ok(InvestigatedArea {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    session_id: row.get(2)?,
                    path: row.get(3)?,
                    pattern: row.get(4)?,
                    agent: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(areas)
    }

    async fn post_message(&self, message: &mut ChannelMessage) -> StoreResult<()> {
        ensure_id(&mut message.id);
        message.created_at = Utc::now();
        let _ = self.lock().execute(
            "INSERT INTO channel_messages (id, session_id, from_agent, to_agent, msg_type, content, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                message.id,
                message.session_id,
                message.from_agent,
                message.to_agent,
                message.msg_type,
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn poll_messages(
        &self,
        session_id: &str,
        to_agent: &str,
    ) -> StoreResult<Vec<ChannelMessage>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, from_agent, to_agent, msg_type, content, read, created_at
             FROM channel_messages
             WHERE session_id = ?1 AND to_agent = ?2 AND read = 0
             ORDER BY created_at",
        )?;
        let messages = stmt
            .query_map(params![session_id, to_agent], |row| {
                Ok(ChannelMessage {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    from_agent: row.get(2)?,
                    to_agent: row.get(3)?,
                    msg_type: row.get(4)?,
                    content: row.get(5)?,
                    read: row.get(6)?,
                    created_at: parse_ts(&row.get::<_, String>(7)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    async fn mark_messages_read(&self, session_id: &str, to_agent: &str) -> StoreResult<()> {
        let _ = self.lock().execute(
            "UPDATE channel_messages SET read = 1 WHERE session_id = ?1 AND to_agent = ?2",
            params![session_id, to_agent],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
