//! Semantic search over the pre-built place index.
//!
//! The index is a read-only SQLite database produced offline: a `places`
//! table of historical-place records and a `place_vectors` table of
//! little-endian f32 embedding BLOBs, one per place. At query time the
//! text encoder embeds the query and the stored vectors are ranked by
//! cosine similarity in Rust — the record count is small enough that a
//! full scan beats maintaining an approximate structure.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::IndexConfig;
use crate::embedding::{create_text_encoder, TextEncoder};
use crate::error::{CoreError, CoreResult};
use crate::matcher::{blob_to_vec, cosine_similarity};
use crate::models::PlaceRecord;

/// Pre-built vector index of historical places plus its paired query
/// encoder.
pub struct PlaceIndex {
    pool: SqlitePool,
    encoder: Box<dyn TextEncoder>,
}

impl std::fmt::Debug for PlaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceIndex")
            .field("pool", &self.pool)
            .field("encoder", &self.encoder.model_name())
            .finish()
    }
}

impl PlaceIndex {
    /// Open the index named by the config. The database must already
    /// exist — the core never creates or mutates it — and is probed once
    /// so a broken schema fails at startup rather than on the first
    /// itinerary request.
    pub async fn open(config: &IndexConfig) -> CoreResult<Self> {
        if !config.db_path.exists() {
            return Err(CoreError::Artifact(format!(
                "place index not found at {}",
                config.db_path.display()
            )));
        }

        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite:{}",
            config.db_path.display()
        ))
        .map_err(|e| CoreError::Artifact(e.to_string()))?
        .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| CoreError::Artifact(format!("open place index: {}", e)))?;

        let encoder = create_text_encoder(&config.embedding)?;
        let index = Self { pool, encoder };
        index.count().await?;
        Ok(index)
    }

    /// Assemble an index from parts. Lets tests and custom wiring swap
    /// in a stub encoder.
    pub fn new(pool: SqlitePool, encoder: Box<dyn TextEncoder>) -> Self {
        Self { pool, encoder }
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Number of places in the index.
    pub async fn count(&self) -> CoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM places")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::Artifact(format!("query place index: {}", e)))?;
        Ok(row.get("n"))
    }

    /// Encode `query` and return up to `k` place records ranked by
    /// descending similarity. Fewer than `k` come back only when the
    /// index itself holds fewer entries.
    pub async fn search(&self, query: &str, k: i64) -> CoreResult<Vec<PlaceRecord>> {
        let query_vec = self.encoder.encode(query).await?;

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.description, p.city, p.region, pv.embedding
            FROM places p
            JOIN place_vectors pv ON pv.place_id = p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::Artifact(format!("query place index: {}", e)))?;

        let mut scored: Vec<(f32, PlaceRecord)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                let record = PlaceRecord {
                    id: row.get("id"),
                    name: row.get("name"),
                    description: row.get("description"),
                    city: row.get("city"),
                    region: row.get("region"),
                };
                (similarity, record)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k.max(0) as usize);

        Ok(scored.into_iter().map(|(_, record)| record).collect())
    }
}
