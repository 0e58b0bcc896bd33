use libsql::{Builder, Connection, Database};
use memory_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared `libsql` connection handle.
///
/// A single serialized connection per adapter set, in the teacher's
/// `TursoStorage` construction style, minus the connection-pool/retry
/// machinery (`pool.rs`/`resilient.rs` in the original) — dropped here
/// since a single in-process `Mutex<Connection>` is sufficient at this
/// scope; see `DESIGN.md`.
#[derive(Clone)]
pub struct TursoConnection {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Arc<Mutex<Connection>>,
}

impl TursoConnection {
    /// Open (creating if absent) a local `libsql` database file.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] if the file cannot be opened.
    pub async fn open_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Connection(format!("libsql open {path}: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| Error::Connection(format!("libsql connect: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an ephemeral in-memory database, for tests and hermetic
    /// seed-scenario runs.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] if the in-memory database cannot
    /// be constructed.
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_local(":memory:").await
    }

    /// Execute a statement with no returned rows (DDL/DML).
    ///
    /// # Errors
    /// Returns [`Error::TransientBackend`] on a SQL execution failure.
    pub async fn execute(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64> {
        let conn = self.conn.lock().await;
        conn.execute(sql, params)
            .await
            .map_err(|e| Error::TransientBackend(format!("{sql}: {e}")))
    }

    /// Run a query and collect every row via `row_fn`.
    ///
    /// # Errors
    /// Returns [`Error::TransientBackend`] on a SQL execution failure.
    pub async fn query_rows<F, T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        mut row_fn: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&libsql::Row) -> Result<T>,
    {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| Error::TransientBackend(format!("{sql}: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::TransientBackend(format!("{sql}: {e}")))?
        {
            out.push(row_fn(&row)?);
        }
        Ok(out)
    }
}
