//! redb table definitions.
//!
//! One flat key-value table for arbitrary payloads (Turns, session
//! workspace blobs, ...), a side table for TTL expiry, a side table for
//! CAS version tags, a stream table for the three atomic scripts and the
//! telemetry stream, and a lease table for the namespace lock primitive.

use redb::TableDefinition;

/// `key -> value bytes`.
pub const VALUES: TableDefinition<&str, &[u8]> = TableDefinition::new("values");

/// `key -> unix millis expiry`. Absence means "no TTL set".
pub const EXPIRY: TableDefinition<&str, i64> = TableDefinition::new("expiry");

/// `key -> version tag`, used by `cas_workspace_update`.
pub const VERSIONS: TableDefinition<&str, &str> = TableDefinition::new("versions");

/// `stream_key -> JSON-encoded `Vec<(entry_id, payload)>``. Backs
/// `atomic_append_with_windowing` and `atomic_promotion`'s queues.
pub const STREAMS: TableDefinition<&str, &[u8]> = TableDefinition::new("streams");

/// `lock_key -> JSON-encoded `(owner, token, expires_at_millis)``.
pub const LEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("leases");
