//! Lifecycle event stream (spec §4.7).
//!
//! Distinct from the rest of [`crate::telemetry`]: where counters,
//! histograms, and gauges answer "how is the system performing right
//! now", the lifecycle stream answers "what happened, in order" —
//! every significance scoring, promotion, consolidation, and
//! distillation step appends one event here. It is backed by the same
//! [`KvAdapter::atomic_append_with_windowing`] primitive the namespace
//! module documents (spec §4.5), bounded to
//! [`crate::types::config::TelemetryStreamConfig::maxlen`] so the
//! stream never grows unbounded.
//!
//! Emission is best-effort: a stream write failure is logged and
//! swallowed rather than propagated, because losing one audit event
//! must never fail the lifecycle cycle that produced it (spec §3).

use crate::storage::KvAdapter;
use crate::types::config::TelemetryStreamConfig;
use crate::types::enums::LifecycleEventType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One entry on the lifecycle stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_type: LifecycleEventType,
    pub ts: DateTime<Utc>,
    pub session_id: Option<String>,
    pub payload: serde_json::Value,
}

impl LifecycleEvent {
    #[must_use]
    pub fn new(event_type: LifecycleEventType, session_id: Option<&str>, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            ts: Utc::now(),
            session_id: session_id.map(str::to_string),
            payload,
        }
    }
}

/// A registered callback notified synchronously whenever a matching
/// event is emitted. Handlers are expected to be cheap (queue a task,
/// bump a counter) — anything expensive should spawn its own work.
pub type EventHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Object-safe emission surface for the lifecycle stream, so tiers and
/// lifecycle engines (which are generic over their own storage adapters,
/// not necessarily the [`KvAdapter`] backing the stream) can hold an
/// `Arc<dyn TelemetrySink>` instead of threading an extra generic
/// parameter through every tier/engine type.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Emit one lifecycle event. Implementations must never fail the
    /// caller; a delivery failure is logged and swallowed (spec §3).
    async fn emit_event(&self, event_type: LifecycleEventType, session_id: Option<&str>, payload: serde_json::Value);
}

#[async_trait]
impl<A: KvAdapter> TelemetrySink for LifecycleEventStream<A> {
    async fn emit_event(&self, event_type: LifecycleEventType, session_id: Option<&str>, payload: serde_json::Value) {
        self.emit(LifecycleEvent::new(event_type, session_id, payload)).await;
    }
}

/// No-op sink used as every tier's and engine's default before a real
/// stream is wired in via `with_events`/`new` (spec's telemetry is
/// best-effort and its absence must not stop engines, per §4.7).
pub struct NoopTelemetrySink;

#[async_trait]
impl TelemetrySink for NoopTelemetrySink {
    async fn emit_event(&self, _event_type: LifecycleEventType, _session_id: Option<&str>, _payload: serde_json::Value) {}
}

/// Append-only lifecycle event stream with named handler registration,
/// backed by a [`KvAdapter`]'s windowed stream primitive.
pub struct LifecycleEventStream<A: KvAdapter> {
    adapter: Arc<A>,
    config: TelemetryStreamConfig,
    handlers: RwLock<HashMap<LifecycleEventType, Vec<EventHandler>>>,
}

impl<A: KvAdapter> LifecycleEventStream<A> {
    #[must_use]
    pub fn new(adapter: Arc<A>, config: TelemetryStreamConfig) -> Self {
        Self { adapter, config, handlers: RwLock::new(HashMap::new()) }
    }

    /// Register a handler invoked for every event of `event_type`,
    /// in addition to (not instead of) the durable stream append.
    pub async fn register(&self, event_type: LifecycleEventType, handler: EventHandler) {
        self.handlers.write().await.entry(event_type).or_default().push(handler);
    }

    /// Emit an event: append it to the bounded stream and fan it out to
    /// any handlers registered for its type. Never returns an error —
    /// append failures are logged at `warn` and otherwise ignored.
    pub async fn emit(&self, event: LifecycleEvent) {
        match serde_json::to_vec(&event) {
            Ok(bytes) => {
                if let Err(err) = self
                    .adapter
                    .atomic_append_with_windowing(&self.config.stream_key, &bytes, self.config.maxlen)
                    .await
                {
                    tracing::warn!(%err, event_type = %event.event_type, "lifecycle event stream append failed");
                }
            }
            Err(err) => {
                tracing::warn!(%err, event_type = %event.event_type, "failed to serialize lifecycle event");
            }
        }

        let handlers = self.handlers.read().await;
        if let Some(registered) = handlers.get(&event.event_type) {
            for handler in registered {
                handler(&event);
            }
        }
    }

    /// Convenience wrapper building a [`LifecycleEvent`] inline.
    pub async fn emit_event(
        &self,
        event_type: LifecycleEventType,
        session_id: Option<&str>,
        payload: serde_json::Value,
    ) {
        self.emit(LifecycleEvent::new(event_type, session_id, payload)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKvAdapter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emit_appends_to_the_windowed_stream() {
        let adapter = Arc::new(MemoryKvAdapter::new());
        let stream = LifecycleEventStream::new(adapter.clone(), TelemetryStreamConfig::default());
        stream
            .emit_event(LifecycleEventType::FactPromoted, Some("session-1"), serde_json::json!({"fact_id": "f1"}))
            .await;

        let id = adapter
            .atomic_append_with_windowing("lifecycle_events", b"probe", 50_000)
            .await
            .unwrap();
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn emit_invokes_registered_handlers_for_matching_event_type() {
        let adapter = Arc::new(MemoryKvAdapter::new());
        let stream = LifecycleEventStream::new(adapter, TelemetryStreamConfig::default());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        stream
            .register(LifecycleEventType::EpisodeCreated, Arc::new(move |_event| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .await;

        stream.emit_event(LifecycleEventType::EpisodeCreated, None, serde_json::json!({})).await;
        stream.emit_event(LifecycleEventType::FactPromoted, None, serde_json::json!({})).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
