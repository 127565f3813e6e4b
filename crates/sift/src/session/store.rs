//! Durable session store.
//!
//! Owns the session collection and the current-session pointer. All
//! writes go through [`SessionStore::commit_messages`] (and the title /
//! lifecycle operations); consumers work on in-memory timeline copies
//! and never hold a writable reference to persisted state.

use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::storage::{KeyedStore, StorageError};

use super::models::{Message, Session};

/// Storage key for the session collection (JSON array).
pub const SESSIONS_KEY: &str = "sessions";

/// Storage key for the current-session pointer (plain id string).
pub const CURRENT_SESSION_KEY: &str = "current-session";

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No session with the given id.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default)]
struct StoreState {
    /// Sessions in insertion order, newest first.
    sessions: Vec<Session>,
    current: Option<String>,
    /// Set when an in-memory change has not reached durable storage.
    dirty: bool,
}

impl StoreState {
    fn find_mut(&mut self, id: &str) -> StoreResult<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// Sessions bucketed by recency for listing.
#[derive(Debug, Clone, Default)]
pub struct SessionGroups {
    /// Updated within the last 7 days (at most 5).
    pub recent: Vec<Session>,
    /// Updated between 7 and 30 days ago.
    pub last_week: Vec<Session>,
    /// Older than 30 days, same calendar year.
    pub last_month: Vec<Session>,
    /// Earlier calendar years.
    pub previous: Vec<Session>,
}

/// Durable, keyed storage of sessions plus the current-session pointer.
pub struct SessionStore {
    state: RwLock<StoreState>,
    storage: Arc<dyn KeyedStore>,
    sentinel_title: String,
}

impl SessionStore {
    /// Create an empty store over the given storage backend.
    pub fn new(storage: Arc<dyn KeyedStore>, config: &Config) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            storage,
            sentinel_title: config.sentinel_title.clone(),
        }
    }

    /// Restore the collection and current pointer from storage.
    ///
    /// Timestamps are rehydrated into temporal values by serde. A
    /// corrupt entry is logged and treated as absent rather than
    /// failing startup; storage-level read failures propagate.
    pub async fn load(&self) -> StoreResult<()> {
        let raw_sessions = self.storage.get(SESSIONS_KEY).await?;
        let raw_current = self.storage.get(CURRENT_SESSION_KEY).await?;

        let mut state = self.state.write().await;
        state.sessions = match raw_sessions.as_deref() {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                warn!("discarding corrupt session collection: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        // The pointer must refer to a loaded session.
        state.current =
            raw_current.filter(|id| state.sessions.iter().any(|s| &s.id == id));
        state.dirty = false;
        debug!(
            "loaded {} sessions, current={:?}",
            state.sessions.len(),
            state.current
        );
        Ok(())
    }

    /// Write the full collection and the current pointer to storage.
    pub async fn persist(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        Self::persist_locked(&self.storage, &mut state).await
    }

    async fn persist_locked(
        storage: &Arc<dyn KeyedStore>,
        state: &mut StoreState,
    ) -> StoreResult<()> {
        let serialized = serde_json::to_string(&state.sessions)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        storage.set(SESSIONS_KEY, &serialized).await?;
        match &state.current {
            Some(id) => storage.set(CURRENT_SESSION_KEY, id).await?,
            None => storage.remove(CURRENT_SESSION_KEY).await?,
        }
        state.dirty = false;
        Ok(())
    }

    /// Persist in-memory state, keeping memory intact and the store
    /// dirty when the write fails.
    async fn try_persist(storage: &Arc<dyn KeyedStore>, state: &mut StoreState) {
        if let Err(e) = Self::persist_locked(storage, state).await {
            warn!("session persist failed, will retry at next settle: {}", e);
            state.dirty = true;
        }
    }

    /// Whether an in-memory change is still awaiting a successful write.
    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.dirty
    }

    /// Allocate a session with the sentinel title and make it current.
    pub async fn create_session(&self) -> String {
        let session = Session::new(&self.sentinel_title);
        let id = session.id.clone();

        let mut state = self.state.write().await;
        state.sessions.insert(0, session);
        state.current = Some(id.clone());
        Self::try_persist(&self.storage, &mut state).await;
        id
    }

    /// Make the given session current.
    pub async fn select_session(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.sessions.iter().any(|s| s.id == id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if state.current.as_deref() == Some(id) {
            return Ok(());
        }
        state.current = Some(id.to_string());
        Self::try_persist(&self.storage, &mut state).await;
        Ok(())
    }

    /// Replace a session's timeline.
    ///
    /// Returns `Ok(false)` without touching timestamps or storage when
    /// `messages` is structurally equal to the stored value. This is
    /// the sole serialized write path for timelines; concurrent commits
    /// are applied last-writer-wins in call-arrival order, each checked
    /// against the latest committed snapshot.
    pub async fn commit_messages(&self, id: &str, messages: &[Message]) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let session = state.find_mut(id)?;

        if session.messages == messages {
            return Ok(false);
        }

        session.messages = messages.to_vec();
        session.updated_at = Utc::now();
        Self::try_persist(&self.storage, &mut state).await;
        Ok(true)
    }

    /// Rename a session. Unchanged titles are a no-op.
    pub async fn update_title(&self, id: &str, title: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let session = state.find_mut(id)?;
        if session.title == title {
            return Ok(());
        }
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Self::try_persist(&self.storage, &mut state).await;
        Ok(())
    }

    /// Remove a session. When it was current, the most recently updated
    /// remaining session becomes current (or none).
    pub async fn delete_session(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.id != id);
        if state.sessions.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }

        if state.current.as_deref() == Some(id) {
            state.current = state
                .sessions
                .iter()
                .max_by_key(|s| s.updated_at)
                .map(|s| s.id.clone());
        }
        Self::try_persist(&self.storage, &mut state).await;
        Ok(())
    }

    /// A clone of the session with the given id.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.state
            .read()
            .await
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// The current session, if any.
    pub async fn current_session(&self) -> Option<Session> {
        let state = self.state.read().await;
        let id = state.current.as_deref()?;
        state.sessions.iter().find(|s| s.id == id).cloned()
    }

    /// The current session id, if any.
    pub async fn current_session_id(&self) -> Option<String> {
        self.state.read().await.current.clone()
    }

    /// All sessions, most recently updated first.
    pub async fn list_sessions(&self) -> Vec<Session> {
        let state = self.state.read().await;
        let mut sessions = state.sessions.clone();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Sessions bucketed by recency, for sidebar-style listings.
    pub async fn grouped_sessions(&self) -> SessionGroups {
        let now = Utc::now();
        let seven_days_ago = now - Duration::days(7);
        let thirty_days_ago = now - Duration::days(30);

        let mut groups = SessionGroups::default();
        for session in self.list_sessions().await {
            if session.updated_at >= seven_days_ago {
                if groups.recent.len() < 5 {
                    groups.recent.push(session);
                }
            } else if session.updated_at >= thirty_days_ago {
                groups.last_week.push(session);
            } else if session.updated_at.year() == now.year() {
                groups.last_month.push(session);
            } else {
                groups.previous.push(session);
            }
        }
        groups
    }
}
