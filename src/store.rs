//! Feature stores: immutable collections of labeled reference embeddings.
//!
//! One store per visual domain, deserialized once at process start from a
//! JSON snapshot of parallel arrays:
//!
//! ```json
//! {
//!   "dims": 512,
//!   "labels": ["Giza", "Luxor"],
//!   "source_ids": ["ref/giza_01.jpg", "ref/luxor_04.jpg"],
//!   "vectors": ["<base64 little-endian f32 bytes>", "..."]
//! }
//! ```
//!
//! Vectors are base64-wrapped little-endian f32 blobs (the same byte
//! format the place index uses). The snapshot is validated on load:
//! equal array lengths, exact dimensionality, finite entries. The store
//! is never mutated afterwards; replacing a snapshot requires a restart.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::matcher::blob_to_vec;

/// Immutable triple of (vectors, labels, source ids) for one visual domain.
#[derive(Debug)]
pub struct FeatureStore {
    dims: usize,
    labels: Vec<String>,
    source_ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

/// On-disk snapshot layout.
#[derive(Deserialize)]
struct Snapshot {
    dims: usize,
    labels: Vec<String>,
    source_ids: Vec<String>,
    vectors: Vec<String>,
}

impl FeatureStore {
    /// Build a store from already-decoded parts, enforcing the snapshot
    /// invariants. Used by [`FeatureStore::load`] and by tests.
    pub fn from_parts(
        dims: usize,
        labels: Vec<String>,
        source_ids: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> CoreResult<Self> {
        if labels.len() != source_ids.len() || labels.len() != vectors.len() {
            return Err(CoreError::Artifact(format!(
                "snapshot arrays disagree: {} labels, {} source_ids, {} vectors",
                labels.len(),
                source_ids.len(),
                vectors.len()
            )));
        }
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dims {
                return Err(CoreError::Artifact(format!(
                    "vector {} has {} dims, snapshot declares {}",
                    i,
                    vector.len(),
                    dims
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(CoreError::Artifact(format!(
                    "vector {} contains a non-finite entry",
                    i
                )));
            }
        }
        Ok(Self {
            dims,
            labels,
            source_ids,
            vectors,
        })
    }

    /// Deserialize and validate a snapshot file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Artifact(format!("read snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            CoreError::Artifact(format!("parse snapshot {}: {}", path.display(), e))
        })?;

        let mut vectors = Vec::with_capacity(snapshot.vectors.len());
        for (i, encoded) in snapshot.vectors.iter().enumerate() {
            let blob = BASE64.decode(encoded).map_err(|e| {
                CoreError::Artifact(format!("vector {} is not valid base64: {}", i, e))
            })?;
            vectors.push(blob_to_vec(&blob));
        }

        Self::from_parts(snapshot.dims, snapshot.labels, snapshot.source_ids, vectors)
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}
