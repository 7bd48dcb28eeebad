//! Nearest-neighbor matching and embedding-vector utilities.
//!
//! The matcher ranks every stored vector by cosine similarity against a
//! query vector and returns the single best record. The scan is
//! deliberately linear brute-force — the reference stores hold a few
//! thousand labeled landmarks or portraits, well under the scale where
//! approximate indexing pays for itself.
//!
//! Also home to the vector byte helpers shared by the snapshot format
//! and the place index:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode those bytes back into a `Vec<f32>`
//! - [`cosine_similarity`] — directional closeness in `[-1, 1]`

use crate::models::MatchResult;
use crate::store::FeatureStore;

/// Rank every record in `store` by cosine similarity to `query` and
/// return the best one. Ties go to the first record in store order, so
/// results are stable across runs.
///
/// An empty store yields `sentinel` with a zero score — a valid,
/// non-error outcome callers must handle as such.
pub fn best_match(query: &[f32], store: &FeatureStore, sentinel: &str) -> MatchResult {
    let mut best: Option<(usize, f32)> = None;

    for (i, vector) in store.vectors().iter().enumerate() {
        let score = cosine_similarity(query, vector);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }

    match best {
        Some((i, score)) => MatchResult {
            label: store.labels()[i].clone(),
            score,
            source_id: Some(store.source_ids()[i].clone()),
        },
        None => MatchResult {
            label: sentinel.to_string(),
            score: 0.0,
            source_id: None,
        },
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or a zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Encode a float vector as little-endian f32 bytes (4 bytes per entry).
/// This is the BLOB format the place index stores embeddings in.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian f32 BLOB back into a float vector. Trailing
/// bytes that do not fill a whole f32 are dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn store(records: &[(&str, &[f32])]) -> FeatureStore {
        let dims = records.first().map(|(_, v)| v.len()).unwrap_or(2);
        FeatureStore::from_parts(
            dims,
            records.iter().map(|(l, _)| l.to_string()).collect(),
            records
                .iter()
                .enumerate()
                .map(|(i, _)| format!("ref/{i}.jpg"))
                .collect(),
            records.iter().map(|(_, v)| v.to_vec()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical_and_opposite() {
        let v = vec![1.0, 2.0, 3.0];
        assert_relative_eq!(cosine_similarity(&v, &v), 1.0, epsilon = 1e-6);
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert_relative_eq!(cosine_similarity(&v, &neg), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_match_picks_maximum_similarity() {
        let s = store(&[("Giza", &[1.0, 0.0]), ("Luxor", &[0.0, 1.0])]);
        let result = best_match(&[0.9, 0.1], &s, "Unknown Place");
        assert_eq!(result.label, "Giza");
        assert_relative_eq!(result.score, 0.994, epsilon = 1e-3);
        assert_eq!(result.source_id.as_deref(), Some("ref/0.jpg"));

        // Brute-force recomputation: score must equal the max over the store.
        let max = s
            .vectors()
            .iter()
            .map(|v| cosine_similarity(&[0.9, 0.1], v))
            .fold(f32::NEG_INFINITY, f32::max);
        assert_relative_eq!(result.score, max);
    }

    #[test]
    fn test_match_label_always_in_store() {
        let s = store(&[
            ("Abu Simbel", &[0.2, 0.8]),
            ("Philae", &[0.5, 0.5]),
            ("Edfu", &[0.9, 0.1]),
        ]);
        for query in [[1.0f32, 0.0], [0.0, 1.0], [0.7, 0.7]] {
            let result = best_match(&query, &s, "Unknown Place");
            assert!(s.labels().contains(&result.label));
        }
    }

    #[test]
    fn test_empty_store_returns_sentinel() {
        let s = FeatureStore::from_parts(2, vec![], vec![], vec![]).unwrap();
        let result = best_match(&[0.3, 0.4], &s, "Unknown Place");
        assert_eq!(result.label, "Unknown Place");
        assert_eq!(result.score, 0.0);
        assert!(result.source_id.is_none());
    }

    #[test]
    fn test_scale_invariance() {
        let s = store(&[("Giza", &[1.0, 0.0]), ("Luxor", &[0.0, 1.0])]);
        let base = best_match(&[0.9, 0.1], &s, "Unknown Place");
        for scale in [0.001f32, 0.5, 10.0, 1000.0] {
            let scaled = [0.9 * scale, 0.1 * scale];
            let result = best_match(&scaled, &s, "Unknown Place");
            assert_eq!(result.label, base.label, "scale {} changed match", scale);
        }
    }

    #[test]
    fn test_tie_break_first_in_store_order() {
        // Two identical stored vectors: the first must win.
        let s = store(&[("First", &[1.0, 0.0]), ("Second", &[1.0, 0.0])]);
        let result = best_match(&[1.0, 0.0], &s, "Unknown Place");
        assert_eq!(result.label, "First");
    }
}
