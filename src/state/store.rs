//! Session persistence layer
//!
//! One session per conversation thread: transcript, shared-state projection
//! and turn phase. Currently in-memory; the trait is the seam for a
//! persistent backend.

use super::SharedState;
use crate::llm::ChatMessage;
use crate::models::TurnPhase;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub thread_id: String,
    pub messages: Vec<ChatMessage>,
    pub state: SharedState,
    pub phase: TurnPhase,
    /// Sequence number of the last published state update.
    pub last_seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            state: SharedState::default(),
            phase: TurnPhase::Idle,
            last_seq: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Trait for session persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, creating an empty one for unknown threads.
    async fn load(&self, thread_id: &str) -> Result<Session>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn remove(&self, thread_id: &str) -> Result<bool>;
}

/// In-memory session store. Concurrent writers to one thread: last write wins.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, thread_id: &str) -> Result<Session> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(thread_id)
            .cloned()
            .unwrap_or_else(|| Session::new(thread_id)))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let mut stored = session.clone();
        stored.updated_at = Utc::now();
        sessions.insert(session.thread_id.clone(), stored);
        Ok(())
    }

    async fn remove(&self, thread_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(thread_id).is_some())
    }
}
