use crate::connection::TursoConnection;
use crate::filter::{cosine_similarity, decode_embedding, encode_embedding, row_matches};
use async_trait::async_trait;
use memory_core::storage::{HealthStatus, RecordId, ScrollFilter, ScrollPage, StorageAdapter, VectorAdapter, VectorMatch};
use memory_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Instant;

/// Generic `libsql`-backed vector store. Embeddings are persisted as a
/// raw `f32` LE blob and similarity is computed in-process — `libsql`
/// carries no ANN index, so this is a brute-force table scan, fine at
/// the scale of one session's episode collection (spec §9: embedding
/// dimension fixed at construction and enforced here).
pub struct TursoVectorAdapter<T> {
    conn: TursoConnection,
    table: String,
    dimension: usize,
    _marker: PhantomData<T>,
}

impl<T> TursoVectorAdapter<T>
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    /// Construct and migrate the backing table for vectors of `dimension`.
    ///
    /// # Errors
    /// Returns a transient backend error if the schema cannot be created.
    pub async fn new(conn: TursoConnection, table: &str, dimension: usize) -> Result<Self> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                    id TEXT PRIMARY KEY, \
                    json TEXT NOT NULL, \
                    embedding BLOB NOT NULL \
                )"
            ),
            (),
        )
        .await?;
        Ok(Self {
            conn,
            table: table.to_string(),
            dimension,
            _marker: PhantomData,
        })
    }

    async fn all_rows(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.conn
            .query_rows(
                &format!("SELECT json, embedding FROM {}", self.table),
                (),
                |row| {
                    let json = row
                        .get::<String>(0)
                        .map_err(|e| Error::TransientBackend(e.to_string()))?;
                    let embedding = row
                        .get::<Vec<u8>>(1)
                        .map_err(|e| Error::TransientBackend(e.to_string()))?;
                    Ok((json, embedding))
                },
            )
            .await
    }
}

#[async_trait]
impl<T: Send + Sync> StorageAdapter for TursoVectorAdapter<T> {
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
impl<T> VectorAdapter<T> for TursoVectorAdapter<T>
where
    T: Send + Sync + Serialize + for<'de> Deserialize<'de>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn store(&self, id: &RecordId, record: &T, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::DataValidation(format!(
                "embedding dimension {} != configured {}",
                embedding.len(),
                self.dimension
            )));
        }
        let json = serde_json::to_string(record)?;
        let blob = encode_embedding(embedding);
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, json, embedding) VALUES (?1, ?2, ?3)",
                    self.table
                ),
                libsql::params![id.clone(), json, blob],
            )
            .await?;
        Ok(())
    }

    async fn store_batch(&self, items: &[(RecordId, T, Vec<f32>)]) -> Result<()> {
        for (id, record, embedding) in items {
            self.store(id, record, embedding).await?;
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

    async fn search(&self, query: &[f32], filter: &ScrollFilter, top_k: usize) -> Result<Vec<VectorMatch<T>>> {
        if query.len() != self.dimension {
            return Err(Error::DataValidation(format!(
                "query dimension {} != configured {}",
                query.len(),
                self.dimension
            )));
        }
        let rows = self.all_rows().await?;
        let mut scored = Vec::new();
        for (json, blob) in rows {
            let value: serde_json::Value = serde_json::from_str(&json)?;
            if !row_matches(filter, &value) {
                continue;
            }
            let embedding = decode_embedding(&blob);
            let score = cosine_similarity(query, &embedding);
            scored.push((score, value));
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
            .into_iter()
            .map(|(score, value)| Ok(VectorMatch { item: serde_json::from_value(value)?, score }))
            .collect()
    }

    async fn scroll(&self, filter: &ScrollFilter) -> Result<ScrollPage<T>> {
        let rows = self.all_rows().await?;
        let mut items = Vec::new();
        for (json, _) in rows {
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
