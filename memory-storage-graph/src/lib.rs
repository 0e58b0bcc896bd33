//! # Memory Storage - Graph
//!
//! In-process property graph implementing
//! [`GraphAdapter`](memory_core::storage::GraphAdapter) over [`petgraph`].
//! Backs the graph side of L3 Episodic Memory's dual index: Episode
//! nodes, Entity nodes, and `MENTIONS` edges between them.
//!
//! Unlike the teacher's two durable backends (`redb`, Turso/`libsql`),
//! no real graph database appears anywhere in the teacher project —
//! this crate is the one genuinely new dependency the expansion
//! introduces (see `DESIGN.md`), drawn from the wider example pack
//! rather than the teacher.
//!
//! ## Example
//!
//! ```no_run
//! use memory_core::storage::{GraphAdapter, StorageAdapter};
//! use memory_storage_graph::PetgraphAdapter;
//!
//! # async fn example() -> memory_core::Result<()> {
//! let graph = PetgraphAdapter::new();
//! graph.connect().await?;
//! graph.store(&"episode-1".to_string(), &["Episode".to_string()], b"{}").await?;
//! # Ok(())
//! # }
//! ```

mod storage;

pub use storage::PetgraphAdapter;

#[cfg(test)]
mod tests;
