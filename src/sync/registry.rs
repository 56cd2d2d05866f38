//! Registry of connected sessions and their user identities.
//!
//! An explicit state object created at process start and cleared on restart
//! — not ambient global state. Sessions move `Connected → Identified →
//! Disconnected`; identity is set by an explicit `identify` call, never
//! inferred. Calls received before identification still function: identity
//! exists for "who changed this" attribution, not authorization. That is a
//! deliberate simplification of this design, not a security boundary.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub user_name: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Maps opaque session ids to user identities.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly connected, not-yet-identified session.
    pub fn register(&self, session_id: Uuid) {
        self.sessions.insert(
            session_id,
            SessionInfo {
                user_name: None,
                connected_at: Utc::now(),
            },
        );
    }

    /// Attach a user identity to a session. Returns false for unknown ids.
    pub fn identify(&self, session_id: Uuid, user_name: impl Into<String>) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(mut info) => {
                info.user_name = Some(user_name.into());
                true
            }
            None => false,
        }
    }

    /// The identity previously set via `identify`, if any.
    pub fn user_name(&self, session_id: Uuid) -> Option<String> {
        self.sessions
            .get(&session_id)
            .and_then(|info| info.user_name.clone())
    }

    pub fn remove(&self, session_id: Uuid) {
        self.sessions.remove(&session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
