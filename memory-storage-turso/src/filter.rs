//! Shared filter-matching and embedding codec helpers used by all three
//! Turso-backed adapters, since `RelationalAdapter<T>`, `VectorAdapter<T>`,
//! and `FullTextAdapter<T>` are all generic over an opaque record type
//! whose fields the adapter cannot name at compile time — filtering
//! happens against the record's serialized JSON form instead.

use memory_core::storage::ScrollFilter;
use std::cmp::Ordering;

fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    match (a, b) {
        (serde_json::Value::Number(x), serde_json::Value::Number(y)) => {
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (serde_json::Value::String(x), serde_json::Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Whether `record` (its full serialized JSON form) satisfies `filter`'s
/// equality, range, and array-containment (for tag-style fields)
/// constraints.
#[must_use]
pub fn row_matches(filter: &ScrollFilter, record: &serde_json::Value) -> bool {
    let serde_json::Value::Object(map) = record else {
        return filter.equals.is_empty() && filter.after.is_none() && filter.before.is_none();
    };

    for (key, expected) in &filter.equals {
        let Some(actual) = map.get(key) else {
            return false;
        };
        let matched = match expected {
            serde_json::Value::Array(wanted) => match actual {
                serde_json::Value::Array(have) => wanted.iter().all(|w| have.contains(w)),
                other => wanted.len() == 1 && wanted.first() == Some(other),
            },
            other => actual == other,
        };
        if !matched {
            return false;
        }
    }

    if let Some((field, bound)) = &filter.after {
        match map.get(field).and_then(|v| compare_values(v, bound)) {
            Some(Ordering::Less) => return false,
            None => return false,
            _ => {}
        }
    }

    if let Some((field, bound)) = &filter.before {
        match map.get(field).and_then(|v| compare_values(v, bound)) {
            Some(Ordering::Greater) | Some(Ordering::Equal) => return false,
            None => return false,
            _ => {}
        }
    }

    true
}

/// Encode an embedding as a little-endian `f32` byte blob.
#[must_use]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian `f32` byte blob back into an embedding.
#[must_use]
pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for a zero-norm
/// vector rather than dividing by zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
