//! Inter-agent channel for collaborative mode.
//!
//! A thin adapter over the store's channel tables. Modeling the shared
//! store as the communication medium keeps the two runners free of any
//! reference to each other.

use std::sync::Arc;

use vigil_store::{ChannelMessage, Store, StoreResult};

/// Store-backed messaging between the two agents of one session.
#[derive(Clone)]
pub struct AgentChannel {
    store: Arc<dyn Store>,
    session_id: String,
}

impl AgentChannel {
    /// Create a channel bound to one session.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
        }
    }

    /// Post a message from one agent to the other.
    pub async fn post(
        &self,
        from: &str,
        to: &str,
        msg_type: &str,
        content: &str,
    ) -> StoreResult<()> {
        let mut message = ChannelMessage {
            id: String::new(),
            session_id: self.session_id.clone(),
            from_agent: from.to_owned(),
            to_agent: to.to_owned(),
            msg_type: msg_type.to_owned(),
            content: content.to_owned(),
            read: false,
            created_at: chrono::Utc::now(),
        };
        self.store.post_message(&mut message).await
    }

    /// Unread messages for an agent; consumed messages are marked read.
    pub async fn poll(&self, to_agent: &str) -> StoreResult<Vec<ChannelMessage>> {
        let messages = self.store.poll_messages(&self.session_id, to_agent).await?;
        if !messages.is_empty() {
            self.store
                .mark_messages_read(&self.session_id, to_agent)
                .await?;
        }
        Ok(messages)
    }
}

/// Render polled messages as tool-result text.
#[must_use]
pub fn format_messages(messages: &[ChannelMessage]) -> String {
    if messages.is_empty() {
        return "No new messages from your partner.".to_owned();
    }
    let mut out = String::new();
    for m in messages {
        out.push_str(&format!(
            "[{}] {} ({}): {}\n",
            m.created_at.format("%H:%M:%S"),
            m.from_agent,
            m.msg_type,
            m.content
        ));
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
