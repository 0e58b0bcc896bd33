//! Namespace and isolation primitives (spec §4.5).
//!
//! Two concerns live here: deriving hash-tag-colocated keys so a single
//! session's L1/L2 records land on the same KV shard, and the lease
//! renewal loop long-running graph writers use to hold a write lock past
//! the base TTL.

use crate::error::{Error, Result};
use crate::storage::KvAdapter;
use std::sync::Arc;
use std::time::Duration;

/// Build a hash-tag-colocated key, e.g. `session:{abc123}:turns`, so that
/// cluster-aware KV backends route every key for a session to the same
/// shard.
#[must_use]
pub fn session_key(session_id: &str, suffix: &str) -> String {
    format!("session:{{{session_id}}}:{suffix}")
}

/// Key for the shared lifecycle telemetry stream (spec §4.7). Not
/// session-scoped: one stream serves the whole deployment.
pub const LIFECYCLE_STREAM_KEY: &str = "lifecycle_events";

/// Holds a renewable lease on a named resource (e.g. a graph node being
/// written by Consolidation) and stops renewing when dropped.
pub struct LeaseGuard {
    token: Option<String>,
    cancel: Arc<tokio_util::sync::CancellationToken>,
    renewal_task: Option<tokio::task::JoinHandle<()>>,
}

impl LeaseGuard {
    /// Acquire a lease through `adapter` and spawn a background task that
    /// renews it every `renewal_interval` until the guard is dropped.
    ///
    /// # Errors
    /// Propagates the adapter's error if the initial acquisition fails,
    /// or returns [`Error::DataValidation`] if the resource is already
    /// held by another owner.
    pub async fn acquire<A: KvAdapter + Send + Sync + 'static>(
        adapter: Arc<A>,
        resource: &str,
        owner: &str,
        lease_ttl: Duration,
        renewal_interval: Duration,
    ) -> Result<Self> {
        let token = adapter
            .acquire_lease(resource, owner, lease_ttl.as_secs())
            .await?
            .ok_or_else(|| Error::DataValidation(format!("lease on {resource} already held")))?;
        let cancel = Arc::new(tokio_util::sync::CancellationToken::new());
        let cancel_clone = cancel.clone();
        let resource_owned = resource.to_string();
        let owner_owned = owner.to_string();
        let renewal_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel_clone.cancelled() => break,
                    () = tokio::time::sleep(renewal_interval) => {
                        if let Err(err) = adapter
                            .acquire_lease(&resource_owned, &owner_owned, lease_ttl.as_secs())
                            .await
                        {
                            tracing::warn!(resource = %resource_owned, owner = %owner_owned, %err, "lease renewal failed");
                        }
                    }
                }
            }
        });
        Ok(Self {
            token: Some(token),
            cancel,
            renewal_task: Some(renewal_task),
        })
    }

    /// The lease token granted by the adapter.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.renewal_task.take() {
            handle.abort();
        }
    }
}

/// Validate that a session id is safe to embed in a hash-tag key (no
/// stray `{`/`}` that would break shard routing).
///
/// # Errors
/// Returns [`Error::DataValidation`] if `session_id` contains `{` or `}`
/// or is empty.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(Error::DataValidation("session_id cannot be empty".to_string()));
    }
    if session_id.contains('{') || session_id.contains('}') {
        return Err(Error::DataValidation(
            "session_id cannot contain '{' or '}'".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_wraps_session_id_in_hash_tag_braces() {
        assert_eq!(session_key("abc123", "turns"), "session:{abc123}:turns");
    }

    #[test]
    fn validate_session_id_rejects_braces() {
        assert!(validate_session_id("abc{123}").is_err());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("abc123").is_ok());
    }
}
