//! # Memory Storage - Turso
//!
//! `libsql`/Turso-backed implementations of `do-memory-core`'s
//! [`RelationalAdapter`](memory_core::storage::RelationalAdapter),
//! [`VectorAdapter`](memory_core::storage::VectorAdapter), and
//! [`FullTextAdapter`](memory_core::storage::FullTextAdapter) contracts —
//! extended from the teacher's original episode/pattern-shaped Turso
//! backend to the three generic contracts spec §4.1 names, carrying
//! forward the teacher's FTS5 (`hybrid_search`) and connection-builder
//! conventions.
//!
//! Vector similarity is computed in-process (brute-force cosine over a
//! table scan): `libsql` has no native ANN index, so this mirrors the
//! teacher's own `turso_multi_dimension` approach of storing the raw
//! embedding and post-filtering/scoring after the SQL fetch.
//!
//! ## Example
//!
//! ```no_run
//! use memory_storage_turso::{TursoConnection, TursoRelationalAdapter};
//! use memory_core::Fact;
//!
//! # async fn example() -> memory_core::Result<()> {
//! let conn = TursoConnection::open_local("./memory.db").await?;
//! let facts: TursoRelationalAdapter<Fact> =
//!     TursoRelationalAdapter::new(conn, "working_memory").await?;
//! # Ok(())
//! # }
//! ```

mod connection;
mod filter;
mod fulltext;
mod relational;
mod vector;

pub use connection::TursoConnection;
pub use fulltext::TursoFullTextAdapter;
pub use relational::TursoRelationalAdapter;
pub use vector::TursoVectorAdapter;

#[cfg(test)]
mod tests;
