//! # Memory Storage - redb
//!
//! Embedded, single-process [`KvAdapter`](memory_core::storage::KvAdapter)
//! over [`redb`]. Backs L1 Active Context's hot store, the three atomic
//! scripts of spec §4.5 (realized as single `WriteTransaction`s, since
//! redb has no server-side scripting but does give one-round-trip ACID
//! writes), per-session leases, and the lifecycle telemetry stream.
//!
//! ## Example
//!
//! ```no_run
//! use memory_core::storage::StorageAdapter;
//! use memory_storage_redb::RedbKvAdapter;
//! use std::path::Path;
//!
//! # async fn example() -> memory_core::Result<()> {
//! let adapter = RedbKvAdapter::open(Path::new("./memory.redb"))?;
//! adapter.connect().await?;
//! # Ok(())
//! # }
//! ```

mod storage;
mod tables;

pub use storage::RedbKvAdapter;

#[cfg(test)]
mod tests;
