//! Client registry and fan-out of controller lines to every session.
//!
//! # Delivery model
//!
//! The hub never touches a socket.  Each session registers a [`LineSink`]; in
//! production that is a bounded per-session queue drained by the session's
//! own writer task, so a `deliver` call never suspends.  A sink that cannot
//! accept a line is dead: it is removed after the current pass and never
//! retried.
//!
//! A session that registers while a broadcast is running may miss that one
//! line but receives every later one.  Lines reach each session in the order
//! they were broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Registry key of one WebSocket session.
pub type SessionId = Uuid;

/// Why a line could not be handed to a session.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The session's writer has stopped.
    #[error("session queue closed")]
    Closed,
    /// The session is not draining its queue.
    #[error("session queue full")]
    Full,
}

/// Something that accepts lines on behalf of one session.
pub trait LineSink: Send + Sync {
    /// Hands `line` to the session without suspending.
    ///
    /// # Errors
    ///
    /// Any error marks the session as dead.
    fn deliver(&self, line: &str) -> Result<(), DeliveryError>;
}

/// The set of live sessions.
#[derive(Default)]
pub struct BroadcastHub {
    sessions: Mutex<HashMap<SessionId, Arc<dyn LineSink>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session.  Returns `false` if `id` was already registered, in
    /// which case the existing sink is kept.
    pub fn register(&self, id: SessionId, sink: Arc<dyn LineSink>) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&id) {
            return false;
        }
        sessions.insert(id, sink);
        true
    }

    /// Removes a session.  Returns `false` if it was not registered (already
    /// pruned by a failed broadcast, or never added).
    pub fn unregister(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Delivers `line` to every registered session and prunes the ones that
    /// failed.  Returns the number of successful deliveries.
    pub fn broadcast(&self, line: &str) -> usize {
        // Snapshot so sinks run outside the lock.
        let targets: Vec<(SessionId, Arc<dyn LineSink>)> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sink) in targets {
            match sink.deliver(line) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("session {id} dropped during broadcast: {e}");
                    dead.push(id);
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.lock();
            for id in dead {
                sessions.remove(&id);
            }
        }
        delivered
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
