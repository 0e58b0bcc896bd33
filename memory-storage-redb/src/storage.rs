use crate::tables::{EXPIRY, LEASES, STREAMS, VALUES, VERSIONS};
use async_trait::async_trait;
use chrono::Utc;
use memory_core::storage::{HealthStatus, KvAdapter, RecordId, ScrollFilter, ScrollPage, StorageAdapter};
use memory_core::{Error, Result};
use redb::{Database, ReadableTable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamEntry {
    id: String,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Lease {
    owner: String,
    token: String,
    expires_at_millis: i64,
}

fn read_stream(bytes: &[u8]) -> Result<Vec<StreamEntry>> {
    serde_json::from_slice(bytes).map_err(Error::from)
}

fn write_stream(entries: &[StreamEntry]) -> Result<Vec<u8>> {
    serde_json::to_vec(entries).map_err(Error::from)
}

/// Embedded `redb` database implementing [`KvAdapter`].
///
/// A dedicated `redb::Database` handle per adapter instance; `connect`
/// is a light readiness probe rather than an actual open, since `redb`
/// opens the file eagerly at construction (mirroring the teacher's
/// `RedbStorage::new` pattern of opening at construction time).
pub struct RedbKvAdapter {
    db: Arc<Database>,
    _tmp_guard: Option<Arc<tempfile::TempDir>>,
}

impl RedbKvAdapter {
    /// Open (creating if absent) a redb database file at `path`.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] if the file cannot be opened/created.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)
            .map_err(|e| Error::Connection(format!("redb open {}: {e}", path.display())))?;
        Self::bootstrap_tables(&db)?;
        Ok(Self {
            db: Arc::new(db),
            _tmp_guard: None,
        })
    }

    /// Create an ephemeral database backed by a temp directory, for
    /// tests and hermetic seed-scenario runs. The temp directory is
    /// kept alive for the adapter's lifetime.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] if the temp file cannot be created.
    pub fn new_ephemeral() -> Result<Self> {
        let dir = tempfile::tempdir()
            .map_err(|e| Error::Connection(format!("tempdir: {e}")))?;
        let path = dir.path().join("memory.redb");
        let db = Database::create(&path)
            .map_err(|e| Error::Connection(format!("redb open {}: {e}", path.display())))?;
        Self::bootstrap_tables(&db)?;
        Ok(Self {
            db: Arc::new(db),
            _tmp_guard: Some(Arc::new(dir)),
        })
    }

    fn bootstrap_tables(db: &Database) -> Result<()> {
        let txn = db
            .begin_write()
            .map_err(|e| Error::Connection(format!("begin_write: {e}")))?;
        {
            txn.open_table(VALUES)
                .map_err(|e| Error::Backend(e.into()))?;
            txn.open_table(EXPIRY).map_err(|e| Error::Backend(e.into()))?;
            txn.open_table(VERSIONS)
                .map_err(|e| Error::Backend(e.into()))?;
            txn.open_table(STREAMS)
                .map_err(|e| Error::Backend(e.into()))?;
            txn.open_table(LEASES).map_err(|e| Error::Backend(e.into()))?;
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(())
    }

    fn is_expired(&self, key: &str) -> Result<bool> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| Error::Backend(e.into()))?;
        let table = txn.open_table(EXPIRY).map_err(|e| Error::Backend(e.into()))?;
        Ok(table
            .get(key)
            .map_err(|e| Error::Backend(e.into()))?
            .is_some_and(|v| v.value() < now_millis()))
    }

    fn matches_filter(equals: &std::collections::HashMap<String, serde_json::Value>, raw: &[u8]) -> bool {
        if equals.is_empty() {
            return true;
        }
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(raw) else {
            return false;
        };
        let serde_json::Value::Object(map) = &value else {
            return false;
        };
        equals.iter().all(|(k, v)| map.get(k).is_some_and(|f| f == v))
    }
}

#[async_trait]
impl StorageAdapter for RedbKvAdapter {
    async fn connect(&self) -> Result<()> {
        // redb opens the file at construction; this is a readiness probe.
        self.db
            .begin_read()
            .map(|_| ())
            .map_err(|e| Error::Connection(format!("redb not ready: {e}")))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let result = self.db.begin_read();
        let latency = start.elapsed();
        match result {
            Ok(_) if latency.as_millis() < 100 => Ok(HealthStatus::Healthy),
            Ok(_) if latency.as_millis() < 500 => Ok(HealthStatus::Degraded),
            Ok(_) => Ok(HealthStatus::Degraded),
            Err(e) => {
                warn!(error = %e, "redb health check failed");
                Ok(HealthStatus::Unhealthy)
            }
        }
    }
}

#[async_trait]
impl KvAdapter for RedbKvAdapter {
    async fn store(&self, key: &RecordId, value: &[u8], ttl_secs: Option<u64>) -> Result<()> {
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        {
            let mut values = txn.open_table(VALUES).map_err(|e| Error::Backend(e.into()))?;
            values
                .insert(key.as_str(), value)
                .map_err(|e| Error::Backend(e.into()))?;
            if let Some(ttl) = ttl_secs {
                let mut expiry = txn.open_table(EXPIRY).map_err(|e| Error::Backend(e.into()))?;
                expiry
                    .insert(key.as_str(), now_millis() + (ttl as i64) * 1000)
                    .map_err(|e| Error::Backend(e.into()))?;
            }
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(())
    }

    async fn store_batch(&self, items: &[(RecordId, Vec<u8>, Option<u64>)]) -> Result<()> {
        for (key, value, ttl) in items {
            self.store(key, value, *ttl).await?;
        }
        Ok(())
    }

    async fn retrieve(&self, key: &RecordId) -> Result<Option<Vec<u8>>> {
        if self.is_expired(key)? {
            return Ok(None);
        }
        let txn = self.db.begin_read().map_err(|e| Error::Backend(e.into()))?;
        let table = txn.open_table(VALUES).map_err(|e| Error::Backend(e.into()))?;
        Ok(table
            .get(key.as_str())
            .map_err(|e| Error::Backend(e.into()))?
            .map(|v| v.value().to_vec()))
    }

    async fn retrieve_batch(&self, keys: &[RecordId]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.retrieve(key).await?);
        }
        Ok(out)
    }

    async fn scroll(&self, prefix: &str, filter: &ScrollFilter) -> Result<ScrollPage<RecordId>> {
        let txn = self.db.begin_read().map_err(|e| Error::Backend(e.into()))?;
        let table = txn.open_table(VALUES).map_err(|e| Error::Backend(e.into()))?;
        let mut items = Vec::new();
        for entry in table.iter().map_err(|e| Error::Backend(e.into()))? {
            let (k, v) = entry.map_err(|e| Error::Backend(e.into()))?;
            let key = k.value();
            if !key.starts_with(prefix) {
                continue;
            }
            if self.is_expired(key)? {
                continue;
            }
            if !Self::matches_filter(&filter.equals, v.value()) {
                continue;
            }
            items.push(key.to_string());
            if filter.limit > 0 && items.len() >= filter.limit {
                break;
            }
        }
        Ok(ScrollPage { items, cursor: None })
    }

    async fn delete(&self, key: &RecordId) -> Result<bool> {
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        let existed;
        {
            let mut values = txn.open_table(VALUES).map_err(|e| Error::Backend(e.into()))?;
            existed = values
                .remove(key.as_str())
                .map_err(|e| Error::Backend(e.into()))?
                .is_some();
            let mut expiry = txn.open_table(EXPIRY).map_err(|e| Error::Backend(e.into()))?;
            expiry.remove(key.as_str()).map_err(|e| Error::Backend(e.into()))?;
            let mut versions = txn.open_table(VERSIONS).map_err(|e| Error::Backend(e.into()))?;
            versions.remove(key.as_str()).map_err(|e| Error::Backend(e.into()))?;
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(existed)
    }

    async fn delete_batch(&self, keys: &[RecordId]) -> Result<usize> {
        let mut count = 0;
        for key in keys {
            if self.delete(key).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn atomic_append_with_windowing(
        &self,
        stream_key: &str,
        entry: &[u8],
        maxlen: usize,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        {
            let mut streams = txn.open_table(STREAMS).map_err(|e| Error::Backend(e.into()))?;
            let mut entries = match streams.get(stream_key).map_err(|e| Error::Backend(e.into()))? {
                Some(v) => read_stream(v.value())?,
                None => Vec::new(),
            };
            entries.push(StreamEntry {
                id: id.clone(),
                payload: entry.to_vec(),
            });
            if maxlen > 0 && entries.len() > maxlen {
                let drop = entries.len() - maxlen;
                entries.drain(0..drop);
            }
            streams
                .insert(stream_key, write_stream(&entries)?.as_slice())
                .map_err(|e| Error::Backend(e.into()))?;
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        debug!(stream_key, id = %id, "atomic_append_with_windowing");
        Ok(id)
    }

    async fn cas_workspace_update(
        &self,
        key: &RecordId,
        expected_version: Option<&str>,
        new_value: &[u8],
        new_version: &str,
    ) -> Result<()> {
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        {
            let mut versions = txn.open_table(VERSIONS).map_err(|e| Error::Backend(e.into()))?;
            let current = versions
                .get(key.as_str())
                .map_err(|e| Error::Backend(e.into()))?
                .map(|v| v.value().to_string());
            match (expected_version, current.as_deref()) {
                (None, None) => {}
                (Some(expected), Some(actual)) if expected == actual => {}
                _ => {
                    return Err(Error::DataValidation(format!(
                        "cas_workspace_update version mismatch on {key}: expected {expected_version:?}, found {current:?}"
                    )));
                }
            }
            versions
                .insert(key.as_str(), new_version)
                .map_err(|e| Error::Backend(e.into()))?;
            let mut values = txn.open_table(VALUES).map_err(|e| Error::Backend(e.into()))?;
            values
                .insert(key.as_str(), new_value)
                .map_err(|e| Error::Backend(e.into()))?;
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(())
    }

    async fn atomic_promotion(
        &self,
        queue_key: &str,
        inflight_key: &str,
        max_items: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        let dequeued;
        {
            let mut streams = txn.open_table(STREAMS).map_err(|e| Error::Backend(e.into()))?;
            let mut queue = match streams.get(queue_key).map_err(|e| Error::Backend(e.into()))? {
                Some(v) => read_stream(v.value())?,
                None => Vec::new(),
            };
            let take = max_items.min(queue.len());
            let batch: Vec<StreamEntry> = queue.drain(0..take).collect();
            streams
                .insert(queue_key, write_stream(&queue)?.as_slice())
                .map_err(|e| Error::Backend(e.into()))?;

            let mut inflight = match streams.get(inflight_key).map_err(|e| Error::Backend(e.into()))? {
                Some(v) => read_stream(v.value())?,
                None => Vec::new(),
            };
            inflight.extend(batch.iter().cloned());
            streams
                .insert(inflight_key, write_stream(&inflight)?.as_slice())
                .map_err(|e| Error::Backend(e.into()))?;

            dequeued = batch.into_iter().map(|e| e.payload).collect();
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(dequeued)
    }

    async fn acquire_lease(
        &self,
        lock_key: &str,
        owner: &str,
        ttl_secs: u64,
    ) -> Result<Option<String>> {
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        let token;
        {
            let mut leases = txn.open_table(LEASES).map_err(|e| Error::Backend(e.into()))?;
            let now = now_millis();
            if let Some(existing) = leases.get(lock_key).map_err(|e| Error::Backend(e.into()))? {
                let lease: Lease = serde_json::from_slice(existing.value()).map_err(Error::from)?;
                if lease.expires_at_millis > now && lease.owner != owner {
                    return Ok(None);
                }
            }
            token = Uuid::new_v4().to_string();
            let lease = Lease {
                owner: owner.to_string(),
                token: token.clone(),
                expires_at_millis: now + (ttl_secs as i64) * 1000,
            };
            let encoded = serde_json::to_vec(&lease).map_err(Error::from)?;
            leases
                .insert(lock_key, encoded.as_slice())
                .map_err(|e| Error::Backend(e.into()))?;
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(Some(token))
    }

    async fn release_lease(&self, lock_key: &str, token: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(|e| Error::Backend(e.into()))?;
        {
            let mut leases = txn.open_table(LEASES).map_err(|e| Error::Backend(e.into()))?;
            if let Some(existing) = leases.get(lock_key).map_err(|e| Error::Backend(e.into()))? {
                let lease: Lease = serde_json::from_slice(existing.value()).map_err(Error::from)?;
                if lease.token == token {
                    drop(existing);
                    leases.remove(lock_key).map_err(|e| Error::Backend(e.into()))?;
                }
            }
        }
        txn.commit().map_err(|e| Error::Backend(e.into()))?;
        Ok(())
    }
}
