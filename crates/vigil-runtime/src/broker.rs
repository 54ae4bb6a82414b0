//! Per-session event channels and the session broker.
//!
//! The analyzer's correctness must never depend on an observer being
//! attached or prompt: [`EventChannel::publish`] is non-blocking. When the
//! bounded buffer is full the oldest buffered event is dropped to admit the
//! new one, and the drop is logged. Observers that need a complete record
//! must persist events elsewhere.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::Notify;
use tracing::{debug, warn};
use vigil_core::RunEvent;

/// Default per-channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug)]
struct ChannelState {
    queue: VecDeque<RunEvent>,
    closed: bool,
    dropped: u64,
}

/// A bounded queue of [`RunEvent`]s for one session.
///
/// Single writer (the runner); typically a single reader (the broker's
/// consumer).
#[derive(Debug)]
pub struct EventChannel {
    state: Mutex<ChannelState>,
    notify: Notify,
    capacity: usize,
}

impl EventChannel {
    /// Create a channel with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel with an explicit capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Publish an event. Never blocks: a full buffer sheds its oldest event
    /// to admit the new one. Publishing to a closed channel is a no-op.
    pub fn publish(&self, event: RunEvent) {
        {
            let mut state = self.state.lock().expect("event channel mutex poisoned");
            if state.closed {
                return;
            }
            if state.queue.len() >= self.capacity {
                let _ = state.queue.pop_front();
                state.dropped += 1;
                warn!(dropped_total = state.dropped, "event channel full, dropped oldest event");
            }
            state.queue.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Receive the next event; `None` once the channel is closed and drained.
    pub async fn recv(&self) -> Option<RunEvent> {
        loop {
            {
                let mut state = self.state.lock().expect("event channel mutex poisoned");
                if let Some(event) = state.queue.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Close the channel. Subsequent reads drain the buffer, then end.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().expect("event channel mutex poisoned");
            state.closed = true;
        }
        self.notify.notify_one();
    }

    /// Events dropped because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.state.lock().expect("event channel mutex poisoned").dropped
    }

    /// Buffered events not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("event channel mutex poisoned").queue.len()
    }

    /// Whether the buffer is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapt a channel into a `Stream` of events ending at close.
pub fn event_stream(channel: Arc<EventChannel>) -> impl Stream<Item = RunEvent> {
    futures::stream::unfold(channel, |channel| async move {
        channel.recv().await.map(|event| (event, channel))
    })
}

/// Named event channels, one per session.
#[derive(Debug, Default)]
pub struct SessionBroker {
    channels: Mutex<HashMap<String, Arc<EventChannel>>>,
}

impl SessionBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel for a session, created on first use.
    pub fn channel(&self, session_id: &str) -> Arc<EventChannel> {
        let mut channels = self.channels.lock().expect("broker mutex poisoned");
        channels
            .entry(session_id.to_owned())
            .or_insert_with(|| {
                debug!(session_id, "session channel created");
                Arc::new(EventChannel::new())
            })
            .clone()
    }

    /// Close and forget a session's channel.
    pub fn remove(&self, session_id: &str) {
        let removed = self
            .channels
            .lock()
            .expect("broker mutex poisoned")
            .remove(session_id);
        if let Some(channel) = removed {
            channel.close();
        }
    }

    /// Number of live channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.lock().expect("broker mutex poisoned").len()
    }

    /// Whether the broker has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
