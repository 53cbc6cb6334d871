//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::store::Entry;

/// Compute the cosine similarity between two embeddings.
///
/// Accumulates in `f64` and returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Vectors of different lengths, empty vectors, zero-norm vectors and
/// non-finite results all score exactly 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matched entry (the image path).
    pub id: String,

    /// Description stored with the entry.
    pub description: String,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Find the `k` entries most similar to `query`.
///
/// Results are ordered by score descending, ties broken by id ascending.
pub fn find_top_k(query: &[f32], entries: &[Entry], k: usize) -> Vec<SearchResult> {
    if k == 0 || entries.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(OrderedFloat<f32>, &Entry)> = entries
        .iter()
        .map(|entry| (OrderedFloat(cosine_similarity(query, &entry.embedding)), entry))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, entry)| SearchResult {
            id: entry.id.clone(),
            description: entry.description.clone(),
            score: score.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(id: &str, embedding: Vec<f32>) -> Entry {
        Entry::new(id, format!("description of {id}"), embedding)
    }

    #[test]
    fn test_cosine_similarity_identities() {
        let a = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]) - 0.707_106_8).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_is_symmetric_and_scale_invariant() {
        let a = [0.3, -1.2, 4.0];
        let b = [2.0, 0.5, -0.7];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));

        let scaled: Vec<f32> = a.iter().map(|x| x * 10.0).collect();
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&scaled, &b)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_find_top_k_orders_by_score() {
        let entries = vec![
            entry("b", vec![0.0, 1.0, 0.0]),
            entry("a", vec![1.0, 0.0, 0.0]),
            entry("c", vec![0.7, 0.7, 0.0]),
        ];

        let results = find_top_k(&[1.0, 0.0, 0.0], &entries, 2);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(results[0].description, "description of a");
    }

    #[test]
    fn test_find_top_k_breaks_ties_by_id() {
        let entries = vec![
            entry("zebra.png", vec![1.0, 0.0]),
            entry("apple.png", vec![2.0, 0.0]),
            entry("mango.png", vec![0.5, 0.0]),
        ];

        let results = find_top_k(&[1.0, 0.0], &entries, 3);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["apple.png", "mango.png", "zebra.png"]);
    }

    #[test]
    fn test_find_top_k_clamps_and_handles_empty() {
        let entries = vec![entry("a", vec![1.0]), entry("b", vec![-1.0])];

        assert_eq!(find_top_k(&[1.0], &entries, 10).len(), 2);
        assert!(find_top_k(&[1.0], &entries, 0).is_empty());
        assert!(find_top_k(&[1.0], &[], 5).is_empty());
    }

    #[test]
    fn test_find_top_k_mismatched_query_scores_zero() {
        let entries = vec![entry("a", vec![1.0, 0.0])];
        let results = find_top_k(&[1.0, 0.0, 0.0], &entries, 1);
        assert_eq!(results[0].score, 0.0);
    }
}
