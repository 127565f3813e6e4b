//! Settle-time persistence gating.
//!
//! Commits a candidate timeline only when it differs structurally from
//! the last committed value, and derives a human-readable title from
//! the first committed user message while the session still carries the
//! sentinel title.

use std::collections::HashMap;

use log::{debug, warn};

use crate::config::Config;
use crate::session::{Message, MessageRole, SessionStore, StoreResult};

/// Gate between in-memory turn state and the durable store.
///
/// Holds one last-committed snapshot per session so repeated settles of
/// an unchanged timeline never reach storage.
pub struct PersistenceGate {
    sentinel_title: String,
    title_max_chars: usize,
    committed: HashMap<String, Vec<Message>>,
}

impl PersistenceGate {
    /// Create a gate with no committed snapshots.
    pub fn new(config: &Config) -> Self {
        Self {
            sentinel_title: config.sentinel_title.clone(),
            title_max_chars: config.title_max_chars,
            committed: HashMap::new(),
        }
    }

    /// Settle a turn: retry any earlier failed persist, then commit the
    /// candidate timeline if it changed. Returns whether a write
    /// happened.
    pub async fn settle(
        &mut self,
        store: &SessionStore,
        session_id: &str,
        timeline: &[Message],
    ) -> StoreResult<bool> {
        if store.is_dirty().await {
            if let Err(e) = store.persist().await {
                warn!("deferred persist still failing: {}", e);
            }
        }

        if self.committed.get(session_id).map(Vec::as_slice) == Some(timeline) {
            debug!("timeline unchanged for {}, skipping commit", session_id);
            return Ok(false);
        }

        let wrote = store.commit_messages(session_id, timeline).await?;
        self.committed
            .insert(session_id.to_string(), timeline.to_vec());

        if wrote {
            self.maybe_derive_title(store, session_id, timeline).await?;
        }
        Ok(wrote)
    }

    /// Name the session after its first user message, once. Sessions
    /// that no longer carry the sentinel title are left alone.
    async fn maybe_derive_title(
        &self,
        store: &SessionStore,
        session_id: &str,
        timeline: &[Message],
    ) -> StoreResult<()> {
        let Some(session) = store.get(session_id).await else {
            return Ok(());
        };
        if session.title != self.sentinel_title {
            return Ok(());
        }

        let text = timeline
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(Message::flattened_text)
            .unwrap_or_default();
        if text.is_empty() {
            return Ok(());
        }

        let title = derive_title(&text, self.title_max_chars);
        debug!("titling session {} as {:?}", session_id, title);
        store.update_title(session_id, &title).await
    }
}

/// First `max_chars` characters of the text, with an ellipsis marker
/// when truncated.
fn derive_title(text: &str, max_chars: usize) -> String {
    let mut title: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        title.push_str("...");
    }
    title
}
