//! L1 `ActiveContext`: raw turns, windowed KV storage (spec §3, §4.1).

use crate::namespace::session_key;
use crate::storage::{KvAdapter, RelationalAdapter, ScrollFilter};
use crate::telemetry::{NoopTelemetrySink, TelemetrySink};
use crate::types::config::L1Config;
use crate::types::enums::LifecycleEventType;
use crate::types::Turn;
use crate::{Error, Result};
use std::sync::Arc;

/// Wraps a [`KvAdapter`] with L1's turn-windowing semantics: every turn
/// appended to a session is trimmed against `max_turns_per_session` in
/// the same round trip, so the ring buffer never needs a separate
/// maintenance pass.
///
/// When `config.enable_relational_backup` is set, every append is also
/// mirrored into a [`RelationalAdapter<Turn>`]; if the KV ring buffer
/// ever comes back empty for a session that the relational backup still
/// has turns for (e.g. after a KV restart that lost its volatile store),
/// reads transparently rebuild from the backup.
pub struct ActiveContext<A: KvAdapter, R: RelationalAdapter<Turn> = crate::storage::memory::MemoryRelationalAdapter<Turn>> {
    adapter: Arc<A>,
    backup: Option<Arc<R>>,
    config: L1Config,
    events: Arc<dyn TelemetrySink>,
}

impl<A: KvAdapter, R: RelationalAdapter<Turn>> ActiveContext<A, R> {
    #[must_use]
    pub fn new(adapter: Arc<A>, config: L1Config) -> Self {
        Self { adapter, backup: None, config, events: Arc::new(NoopTelemetrySink) }
    }

    /// Attach a relational backup store, mirrored on every append when
    /// `config.enable_relational_backup` is true.
    #[must_use]
    pub fn with_relational_backup(mut self, backup: Arc<R>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Wire in the lifecycle event stream so every public method emits a
    /// `tier_access` event (spec §4.2c).
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn TelemetrySink>) -> Self {
        self.events = events;
        self
    }

    /// Append a turn to its session's ring buffer, windowed to
    /// `config.max_turns_per_session`: once the buffer exceeds the
    /// window, the oldest turns are deleted in the same call.
    ///
    /// # Errors
    /// Propagates the underlying adapter's error.
    pub async fn append_turn(&self, turn: &Turn) -> Result<()> {
        let payload = serde_json::to_vec(turn)?;
        let ttl_secs = self.config.ttl_hours * 3600;
        let turn_key = session_key(&turn.session_id, &format!("turn:{}", turn.id));
        self.adapter.store(&turn_key, &payload, Some(ttl_secs)).await?;

        if self.config.enable_relational_backup {
            if let Some(backup) = &self.backup {
                if let Err(err) = backup.store(&turn.id.to_string(), turn).await {
                    tracing::warn!(%err, turn_id = %turn.id, "relational backup write failed, L1 remains KV-only for this turn");
                }
            }
        }

        let prefix = session_key(&turn.session_id, "turn:");
        let filter = ScrollFilter { limit: usize::MAX, ..ScrollFilter::default() };
        let page = self.adapter.scroll(&prefix, &filter).await?;
        if page.items.len() > self.config.max_turns_per_session {
            let mut keyed = Vec::with_capacity(page.items.len());
            for key in page.items {
                if let Some(bytes) = self.adapter.retrieve(&key).await? {
                    let stored: Turn = serde_json::from_slice(&bytes)?;
                    keyed.push((stored.created_at, key));
                }
            }
            keyed.sort_by_key(|(created_at, _)| *created_at);
            let excess = keyed.len().saturating_sub(self.config.max_turns_per_session);
            let stale: Vec<_> = keyed.into_iter().take(excess).map(|(_, key)| key).collect();
            if !stale.is_empty() {
                self.adapter.delete_batch(&stale).await?;
            }
        }
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                Some(&turn.session_id),
                serde_json::json!({"tier": "l1_active_context", "op": "append_turn", "turn_id": turn.id}),
            )
            .await;
        Ok(())
    }

    /// Fetch the most recent `limit` turns for a session, oldest first.
    ///
    /// Falls back to the relational backup (if configured) when the KV
    /// ring buffer has no entries for the session, so an L1 process
    /// restart that wiped a volatile KV store does not silently present
    /// an empty context.
    ///
    /// # Errors
    /// Propagates the underlying adapter's error.
    pub async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let prefix = session_key(session_id, "turn:");
        let filter = ScrollFilter { limit, ..ScrollFilter::default() };
        let page = self.adapter.scroll(&prefix, &filter).await?;
        let mut turns = Vec::with_capacity(page.items.len());
        for key in page.items {
            if let Some(bytes) = self.adapter.retrieve(&key).await? {
                turns.push(serde_json::from_slice::<Turn>(&bytes)?);
            }
        }

        if turns.is_empty() {
            if let Some(backup) = &self.backup {
                let mut backup_filter = ScrollFilter::default();
                backup_filter.equals.insert("session_id".to_string(), serde_json::json!(session_id));
                backup_filter.limit = limit;
                match backup.scroll(&backup_filter).await {
                    Ok(backup_page) => {
                        for turn in backup_page.items {
                            let payload = serde_json::to_vec(&turn)?;
                            let ttl_secs = self.config.ttl_hours * 3600;
                            let turn_key = session_key(&turn.session_id, &format!("turn:{}", turn.id));
                            if let Err(err) = self.adapter.store(&turn_key, &payload, Some(ttl_secs)).await {
                                tracing::warn!(%err, "failed to rehydrate KV ring buffer from relational backup");
                            }
                            turns.push(turn);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, %session_id, "relational backup scroll failed during L1 fallback");
                    }
                }
            }
        }

        turns.sort_by_key(|t| t.created_at);
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                Some(session_id),
                serde_json::json!({"tier": "l1_active_context", "op": "recent_turns", "count": turns.len()}),
            )
            .await;
        Ok(turns)
    }

    /// Fetch a single turn by id.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the turn is absent or expired.
    pub async fn get_turn(&self, session_id: &str, turn_id: uuid::Uuid) -> Result<Turn> {
        let key = session_key(session_id, &format!("turn:{turn_id}"));
        let bytes = self
            .adapter
            .retrieve(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("turn {turn_id}")))?;
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                Some(session_id),
                serde_json::json!({"tier": "l1_active_context", "op": "get_turn", "turn_id": turn_id}),
            )
            .await;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKvAdapter;

    #[tokio::test]
    async fn append_and_recent_turns_round_trip() {
        let adapter = Arc::new(MemoryKvAdapter::new());
        let tier = ActiveContext::new(adapter, L1Config::default());
        let turn = Turn::new("session-1", "user", "hello").unwrap();
        tier.append_turn(&turn).await.unwrap();

        let recent = tier.recent_turns("session-1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "hello");
    }

    #[tokio::test]
    async fn window_trims_to_max_turns_per_session() {
        let adapter = Arc::new(MemoryKvAdapter::new());
        let mut config = L1Config::default();
        config.max_turns_per_session = 3;
        let tier = ActiveContext::new(adapter, config);
        for i in 0..5 {
            let turn = Turn::new("session-1", "user", format!("turn {i}")).unwrap();
            tier.append_turn(&turn).await.unwrap();
        }
        let recent = tier.recent_turns("session-1", 100).await.unwrap();
        assert!(recent.len() <= 3);
    }
}
