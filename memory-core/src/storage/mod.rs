//! # Storage Adapter Contract
//!
//! A uniform operation set that every backend kind (key-value,
//! relational, vector, graph, full-text) implements, so tiers and
//! engines work against `dyn` trait objects rather than a concrete
//! database client. Concrete adapters live in sibling crates
//! (`do-memory-storage-redb`, `do-memory-storage-turso`,
//! `do-memory-storage-graph`) and in [`memory`] for hermetic tests.

pub mod circuit_breaker;
pub mod memory;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A record identifier, namespaced by the caller (usually a session id
/// or tier name) so adapters can colocate related keys.
pub type RecordId = String;

/// Health status returned by [`StorageAdapter::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Adapter is reachable and serving requests normally.
    Healthy,
    /// Adapter is reachable but degraded (e.g. high latency).
    Degraded,
    /// Adapter is unreachable or failing all requests.
    Unhealthy,
}

/// A filter expression used by `scroll` and tier-level queries.
/// Intentionally narrow: equality and range matches on metadata
/// fields, no general-purpose query language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrollFilter {
    /// Exact-match constraints on named fields.
    pub equals: HashMap<String, serde_json::Value>,
    /// Inclusive lower bound on a named (typically timestamp) field.
    pub after: Option<(String, serde_json::Value)>,
    /// Inclusive upper bound on a named field.
    pub before: Option<(String, serde_json::Value)>,
    /// Maximum number of records to return.
    pub limit: usize,
    /// Opaque continuation token from a prior call, for pagination.
    pub cursor: Option<String>,
}

/// Page of results from a `scroll` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollPage<T> {
    /// Records in this page, in adapter-defined order.
    pub items: Vec<T>,
    /// Continuation token for the next page, `None` when exhausted.
    pub cursor: Option<String>,
}

/// A vector similarity match from `VectorAdapter::search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch<T> {
    /// The matched record.
    pub item: T,
    /// Cosine similarity in `[-1.0, 1.0]`, higher is closer.
    pub score: f32,
}

/// A full-text match from `FullTextAdapter::search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextMatch<T> {
    /// The matched record.
    pub item: T,
    /// Backend-native relevance score (e.g. BM25), higher is more relevant.
    pub score: f32,
}

/// Operations common to every backend kind.
///
/// `connect`/`disconnect` bracket the adapter's lifecycle; tiers call
/// `connect` during `initialize()` and `disconnect` during shutdown.
/// `health_check` backs the Wake-Up Sweep's readiness probe.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Establish the backend connection / open the database handle.
    ///
    /// # Errors
    /// Returns [`crate::Error::Connection`] if the backend cannot be reached.
    async fn connect(&self) -> Result<()>;

    /// Release the backend connection. Idempotent.
    ///
    /// # Errors
    /// Returns an error only if a graceful close fails; callers should
    /// still consider the adapter unusable afterward either way.
    async fn disconnect(&self) -> Result<()>;

    /// Probe backend reachability without mutating state.
    ///
    /// # Errors
    /// Returns an error only for unexpected failures; an unreachable
    /// backend should surface as `Ok(HealthStatus::Unhealthy)`, not `Err`.
    async fn health_check(&self) -> Result<HealthStatus>;
}

/// Key-value adapter contract. Backs L1 hot storage, namespace leases,
/// and the three atomic operation scripts (§4.5).
#[async_trait]
pub trait KvAdapter: StorageAdapter {
    /// Store a single value, overwriting any existing value at `key`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Serialization`] or a transient backend error.
    async fn store(&self, key: &RecordId, value: &[u8], ttl_secs: Option<u64>) -> Result<()>;

    /// Store multiple key/value pairs. Not required to be atomic across
    /// keys; callers needing atomicity use `cas_workspace_update`.
    ///
    /// # Errors
    /// Returns an error if any individual store fails.
    async fn store_batch(&self, items: &[(RecordId, Vec<u8>, Option<u64>)]) -> Result<()>;

    /// Retrieve a value by key.
    ///
    /// # Errors
    /// Returns a transient backend error; a missing key is `Ok(None)`.
    async fn retrieve(&self, key: &RecordId) -> Result<Option<Vec<u8>>>;

    /// Retrieve multiple values, preserving input order (`None` for misses).
    ///
    /// # Errors
    /// Returns an error if the batch lookup itself fails.
    async fn retrieve_batch(&self, keys: &[RecordId]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Enumerate keys under a namespace prefix, newest-appended first.
    /// Pure filter enumeration — distinct from similarity or relevance
    /// search, which this adapter kind does not support.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn scroll(&self, prefix: &str, filter: &ScrollFilter) -> Result<ScrollPage<RecordId>>;

    /// Delete a single key. Returns `true` if a value was present.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete(&self, key: &RecordId) -> Result<bool>;

    /// Delete multiple keys, returning how many were actually present.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete_batch(&self, keys: &[RecordId]) -> Result<usize>;

    /// Append `entry` to the stream at `stream_key`, trimming to
    /// `maxlen` in the same round trip (§4.5, §4.7).
    ///
    /// # Errors
    /// Returns an error if the append/trim cannot be completed atomically.
    async fn atomic_append_with_windowing(
        &self,
        stream_key: &str,
        entry: &[u8],
        maxlen: usize,
    ) -> Result<String>;

    /// Compare-and-swap update of `key`: succeeds only if the stored
    /// value's version tag matches `expected_version` (§4.5).
    ///
    /// # Errors
    /// Returns [`crate::Error::DataValidation`] on a version mismatch.
    async fn cas_workspace_update(
        &self,
        key: &RecordId,
        expected_version: Option<&str>,
        new_value: &[u8],
        new_version: &str,
    ) -> Result<()>;

    /// Atomically dequeue up to `max_items` pending promotion entries
    /// from `queue_key` and mark them in-flight under `inflight_key`,
    /// in one round trip (§4.5).
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn atomic_promotion(
        &self,
        queue_key: &str,
        inflight_key: &str,
        max_items: usize,
    ) -> Result<Vec<Vec<u8>>>;

    /// Acquire or renew a lease for `lock_key`, good for `ttl_secs`.
    /// Returns the lease token on success.
    ///
    /// # Errors
    /// Returns [`crate::Error::DataValidation`] if the lease is held by
    /// another owner and not expired.
    async fn acquire_lease(
        &self,
        lock_key: &str,
        owner: &str,
        ttl_secs: u64,
    ) -> Result<Option<String>>;

    /// Release a previously acquired lease.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn release_lease(&self, lock_key: &str, token: &str) -> Result<()>;
}

/// Relational adapter contract. Backs L2 working memory, where facts
/// need structured filtering (topic, session, tier) alongside a
/// best-effort full-text scan.
#[async_trait]
pub trait RelationalAdapter<T>: StorageAdapter
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    /// Insert or replace a single record.
    ///
    /// # Errors
    /// Returns [`crate::Error::DataValidation`] or a transient backend error.
    async fn store(&self, id: &RecordId, record: &T) -> Result<()>;

    /// Insert or replace multiple records.
    ///
    /// # Errors
    /// Returns an error if any individual store fails.
    async fn store_batch(&self, items: &[(RecordId, T)]) -> Result<()>;

    /// Retrieve a record by id.
    ///
    /// # Errors
    /// Returns a transient backend error; a missing id is `Ok(None)`.
    async fn retrieve(&self, id: &RecordId) -> Result<Option<T>>;

    /// Retrieve multiple records, preserving input order.
    ///
    /// # Errors
    /// Returns an error if the batch lookup itself fails.
    async fn retrieve_batch(&self, ids: &[RecordId]) -> Result<Vec<Option<T>>>;

    /// Keyword/metadata search over stored records, ranked by relevance.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn search(&self, query: &str, filter: &ScrollFilter) -> Result<Vec<FullTextMatch<T>>>;

    /// Pure filter enumeration, no relevance ranking.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn scroll(&self, filter: &ScrollFilter) -> Result<ScrollPage<T>>;

    /// Delete a record by id. Returns `true` if it was present.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete(&self, id: &RecordId) -> Result<bool>;

    /// Delete multiple records, returning how many were present.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete_batch(&self, ids: &[RecordId]) -> Result<usize>;
}

/// Vector adapter contract. Backs one side of L3's dual index.
#[async_trait]
pub trait VectorAdapter<T>: StorageAdapter
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    /// Dimensionality this adapter was configured for (fixed at
    /// connect time; see `SPEC_FULL.md` §9 embedding dimension decision).
    fn dimension(&self) -> usize;

    /// Upsert a record with its embedding.
    ///
    /// # Errors
    /// Returns [`crate::Error::DataValidation`] if `embedding.len() != dimension()`.
    async fn store(&self, id: &RecordId, record: &T, embedding: &[f32]) -> Result<()>;

    /// Upsert multiple records with embeddings.
    ///
    /// # Errors
    /// Returns an error if any individual upsert fails validation.
    async fn store_batch(&self, items: &[(RecordId, T, Vec<f32>)]) -> Result<()>;

    /// Retrieve a record (without its embedding) by id.
    ///
    /// # Errors
    /// Returns a transient backend error; a missing id is `Ok(None)`.
    async fn retrieve(&self, id: &RecordId) -> Result<Option<T>>;

    /// Retrieve multiple records, preserving input order.
    ///
    /// # Errors
    /// Returns an error if the batch lookup itself fails.
    async fn retrieve_batch(&self, ids: &[RecordId]) -> Result<Vec<Option<T>>>;

    /// Nearest-neighbor search by cosine similarity, optionally narrowed
    /// by metadata filter.
    ///
    /// # Errors
    /// Returns [`crate::Error::DataValidation`] if `query.len() != dimension()`.
    async fn search(
        &self,
        query: &[f32],
        filter: &ScrollFilter,
        top_k: usize,
    ) -> Result<Vec<VectorMatch<T>>>;

    /// Pure filter enumeration over stored records, no similarity ranking.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn scroll(&self, filter: &ScrollFilter) -> Result<ScrollPage<T>>;

    /// Delete a record by id.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete(&self, id: &RecordId) -> Result<bool>;

    /// Delete multiple records.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete_batch(&self, ids: &[RecordId]) -> Result<usize>;
}

/// Graph adapter contract. Backs the other side of L3's dual index —
/// explicit relationships between episodes and the facts/turns that
/// feed them.
#[async_trait]
pub trait GraphAdapter: StorageAdapter {
    /// Insert or replace a node with its metadata payload.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn store(&self, node_id: &RecordId, labels: &[String], properties: &[u8]) -> Result<()>;

    /// Insert or replace multiple nodes.
    ///
    /// # Errors
    /// Returns an error if any individual store fails.
    async fn store_batch(&self, nodes: &[(RecordId, Vec<String>, Vec<u8>)]) -> Result<()>;

    /// Retrieve a node's raw property payload.
    ///
    /// # Errors
    /// Returns a transient backend error; a missing node is `Ok(None)`.
    async fn retrieve(&self, node_id: &RecordId) -> Result<Option<Vec<u8>>>;

    /// Retrieve multiple nodes, preserving input order.
    ///
    /// # Errors
    /// Returns an error if the batch lookup itself fails.
    async fn retrieve_batch(&self, node_ids: &[RecordId]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Create a directed, labeled edge between two nodes.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if either endpoint is absent.
    async fn link(
        &self,
        from: &RecordId,
        to: &RecordId,
        relation: &str,
        properties: &[u8],
    ) -> Result<()>;

    /// Traverse outbound edges of a given relation up to `depth` hops.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn search(
        &self,
        node_id: &RecordId,
        relation: Option<&str>,
        depth: usize,
    ) -> Result<Vec<RecordId>>;

    /// Pure filter enumeration over nodes by label, no traversal.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn scroll(&self, label: &str, filter: &ScrollFilter) -> Result<ScrollPage<RecordId>>;

    /// Delete a node and its incident edges.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete(&self, node_id: &RecordId) -> Result<bool>;

    /// Delete multiple nodes and their incident edges.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete_batch(&self, node_ids: &[RecordId]) -> Result<usize>;
}

/// Full-text adapter contract. Backs L4 semantic memory's document store.
#[async_trait]
pub trait FullTextAdapter<T>: StorageAdapter
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    /// Index or reindex a document.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn store(&self, id: &RecordId, record: &T, body: &str) -> Result<()>;

    /// Index or reindex multiple documents.
    ///
    /// # Errors
    /// Returns an error if any individual store fails.
    async fn store_batch(&self, items: &[(RecordId, T, String)]) -> Result<()>;

    /// Retrieve a document by id.
    ///
    /// # Errors
    /// Returns a transient backend error; a missing id is `Ok(None)`.
    async fn retrieve(&self, id: &RecordId) -> Result<Option<T>>;

    /// Retrieve multiple documents, preserving input order.
    ///
    /// # Errors
    /// Returns an error if the batch lookup itself fails.
    async fn retrieve_batch(&self, ids: &[RecordId]) -> Result<Vec<Option<T>>>;

    /// Full-text query, ranked by backend-native relevance (e.g. BM25/FTS5).
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn search(&self, query: &str, filter: &ScrollFilter) -> Result<Vec<FullTextMatch<T>>>;

    /// Pure filter enumeration, no relevance ranking.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn scroll(&self, filter: &ScrollFilter) -> Result<ScrollPage<T>>;

    /// Delete a document by id.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete(&self, id: &RecordId) -> Result<bool>;

    /// Delete multiple documents.
    ///
    /// # Errors
    /// Returns a transient backend error.
    async fn delete_batch(&self, ids: &[RecordId]) -> Result<usize>;
}
