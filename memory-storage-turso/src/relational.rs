use crate::connection::TursoConnection;
use crate::filter::row_matches;
use async_trait::async_trait;
use memory_core::storage::{
    FullTextMatch, HealthStatus, RecordId, RelationalAdapter, ScrollFilter, ScrollPage, StorageAdapter,
};
use memory_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Instant;

/// Generic `libsql`-backed relational store: one main table keyed by
/// id holding the record's serialized JSON, paired with an FTS5 virtual
/// table over that same JSON blob for the non-stemming, exact-token
/// free-text search L2 requires (domain identifiers like SKUs must
/// match verbatim, so no Porter-stemmer tokenizer is used).
pub struct TursoRelationalAdapter<T> {
    conn: TursoConnection,
    table: String,
    _marker: PhantomData<T>,
}

impl<T> TursoRelationalAdapter<T>
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    /// Construct and migrate the backing table/FTS5 index.
    ///
    /// # Errors
    /// Returns a transient backend error if the schema cannot be created.
    pub async fn new(conn: TursoConnection, table: &str) -> Result<Self> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                    id TEXT PRIMARY KEY, \
                    json TEXT NOT NULL, \
                    created_at INTEGER NOT NULL DEFAULT (unixepoch()) \
                )"
            ),
            (),
        )
        .await?;
        conn.execute(
            &format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS {table}_fts USING fts5(\
                    id UNINDEXED, body, tokenize='unicode61 remove_diacritics 0')"
            ),
            (),
        )
        .await?;
        Ok(Self {
            conn,
            table: table.to_string(),
            _marker: PhantomData,
        })
    }

    async fn upsert(&self, id: &RecordId, record: &T) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.conn
            .execute(
                &format!("INSERT OR REPLACE INTO {} (id, json) VALUES (?1, ?2)", self.table),
                libsql::params![id.clone(), json.clone()],
            )
            .await?;
        self.conn
            .execute(
                &format!("DELETE FROM {}_fts WHERE id = ?1", self.table),
                libsql::params![id.clone()],
            )
            .await?;
        self.conn
            .execute(
                &format!("INSERT INTO {}_fts (id, body) VALUES (?1, ?2)", self.table),
                libsql::params![id.clone(), json],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<T: Send + Sync> StorageAdapter for TursoRelationalAdapter<T> {
    async fn connect(&self) -> Result<()> {
        self.conn.execute("SELECT 1", ()).await.map(|_| ())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let ok = self.conn.execute("SELECT 1", ()).await.is_ok();
        let latency = start.elapsed();
        Ok(match (ok, latency.as_millis()) {
            (false, _) => HealthStatus::Unhealthy,
            (true, ms) if ms < 100 => HealthStatus::Healthy,
            (true, ms) if ms < 500 => HealthStatus::Degraded,
            (true, _) => HealthStatus::Degraded,
        })
    }
}

#[async_trait]
impl<T> RelationalAdapter<T> for TursoRelationalAdapter<T>
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    async fn store(&self, id: &RecordId, record: &T) -> Result<()> {
        self.upsert(id, record).await
    }

    async fn store_batch(&self, items: &[(RecordId, T)]) -> Result<()> {
        for (id, record) in items {
            self.upsert(id, record).await?;
        }
        Ok(())
    }

    async fn retrieve(&self, id: &RecordId) -> Result<Option<T>> {
        let rows: Vec<String> = self
            .conn
            .query_rows(
                &format!("SELECT json FROM {} WHERE id = ?1", self.table),
                libsql::params![id.clone()],
                |row| {
                    row.get::<String>(0)
                        .map_err(|e| Error::TransientBackend(e.to_string()))
                },
            )
            .await?;
        match rows.into_iter().next() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn retrieve_batch(&self, ids: &[RecordId]) -> Result<Vec<Option<T>>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.retrieve(id).await?);
        }
        Ok(out)
    }

    async fn search(&self, query: &str, filter: &ScrollFilter) -> Result<Vec<FullTextMatch<T>>> {
        if query.trim().is_empty() || query.trim() == "*" {
            return Ok(self
                .scroll(filter)
                .await?
                .items
                .into_iter()
                .map(|item| FullTextMatch { item, score: 0.0 })
                .collect());
        }
        let sql = format!(
            "SELECT t.json, bm25({table}_fts) AS rank FROM {table}_fts fts \
             JOIN {table} t ON t.id = fts.id \
             WHERE {table}_fts MATCH ?1 ORDER BY rank LIMIT 500",
            table = self.table
        );
        let rows: Vec<(String, f64)> = self
            .conn
            .query_rows(&sql, libsql::params![query.to_string()], |row| {
                let json = row
                    .get::<String>(0)
                    .map_err(|e| Error::TransientBackend(e.to_string()))?;
                let rank = row
                    .get::<f64>(1)
                    .map_err(|e| Error::TransientBackend(e.to_string()))?;
                Ok((json, rank))
            })
            .await?;
        let mut out = Vec::new();
        for (json, rank) in rows {
            let value: serde_json::Value = serde_json::from_str(&json)?;
            if !row_matches(filter, &value) {
                continue;
            }
            let item: T = serde_json::from_value(value)?;
            // bm25() is negative and smaller-is-better; invert to a
            // positive, higher-is-more-relevant score for callers.
            out.push(FullTextMatch {
                item,
                score: (-rank) as f32,
            });
            if filter.limit > 0 && out.len() >= filter.limit {
                break;
            }
        }
        Ok(out)
    }

    async fn scroll(&self, filter: &ScrollFilter) -> Result<ScrollPage<T>> {
        let rows: Vec<String> = self
            .conn
            .query_rows(
                &format!("SELECT json FROM {} ORDER BY created_at DESC", self.table),
                (),
                |row| {
                    row.get::<String>(0)
                        .map_err(|e| Error::TransientBackend(e.to_string()))
                },
            )
            .await?;
        let mut items = Vec::new();
        for json in rows {
            let value: serde_json::Value = serde_json::from_str(&json)?;
            if !row_matches(filter, &value) {
                continue;
            }
            items.push(serde_json::from_value(value)?);
            if filter.limit > 0 && items.len() >= filter.limit {
                break;
            }
        }
        Ok(ScrollPage { items, cursor: None })
    }

    async fn delete(&self, id: &RecordId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", self.table),
                libsql::params![id.clone()],
            )
            .await?;
        self.conn
            .execute(
                &format!("DELETE FROM {}_fts WHERE id = ?1", self.table),
                libsql::params![id.clone()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete_batch(&self, ids: &[RecordId]) -> Result<usize> {
        let mut count = 0;
        for id in ids {
            if self.delete(id).await? {
                count += 1;
            }
        }
        Ok(count)
    }
}
