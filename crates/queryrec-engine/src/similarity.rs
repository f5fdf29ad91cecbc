//! Pairwise semantic similarity between text items

use crate::embedder::{HashedNgramEmbedder, TextEmbedder};
use queryrec_core::{RecommendError, Result};
use std::sync::Arc;

/// Anything usable as a list of text items: one string or a sequence
pub trait TextItems {
    fn into_items(self) -> Vec<String>;
}

impl TextItems for &str {
    fn into_items(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl TextItems for String {
    fn into_items(self) -> Vec<String> {
        vec![self]
    }
}

impl TextItems for &String {
    fn into_items(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl TextItems for Vec<String> {
    fn into_items(self) -> Vec<String> {
        self
    }
}

impl TextItems for &[String] {
    fn into_items(self) -> Vec<String> {
        self.to_vec()
    }
}

impl TextItems for &Vec<String> {
    fn into_items(self) -> Vec<String> {
        self.clone()
    }
}

impl TextItems for &[&str] {
    fn into_items(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// `len(a) x len(b)` cosine similarities, each within [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    values: Vec<Vec<f32>>,
    cols: usize,
}

impl SimilarityMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    pub fn n_cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row][col]
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.values
    }

    /// Best match of each row item against all column items
    pub fn row_max(&self) -> Vec<f32> {
        self.values
            .iter()
            .map(|row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
            .collect()
    }

    /// Best match of each column item against all row items
    pub fn col_max(&self) -> Vec<f32> {
        let mut best = vec![f32::NEG_INFINITY; self.cols];
        for row in &self.values {
            for (b, v) in best.iter_mut().zip(row) {
                *b = b.max(*v);
            }
        }
        best
    }

    pub fn into_inner(self) -> Vec<Vec<f32>> {
        self.values
    }
}

/// Cosine similarity over embeddings from a pluggable model
///
/// Pure with respect to its inputs; safe to share across threads.
#[derive(Clone)]
pub struct SimilarityEngine {
    embedder: Arc<dyn TextEmbedder>,
}

impl SimilarityEngine {
    pub fn new(embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &dyn TextEmbedder {
        self.embedder.as_ref()
    }

    /// Cosine similarity of every item in `a` against every item in `b`
    ///
    /// Returns `EmptyInput` if either side has no items.
    pub fn similarity(&self, a: impl TextItems, b: impl TextItems) -> Result<SimilarityMatrix> {
        let a = a.into_items();
        let b = b.into_items();
        if a.is_empty() {
            return Err(RecommendError::EmptyInput("left-hand text list"));
        }
        if b.is_empty() {
            return Err(RecommendError::EmptyInput("right-hand text list"));
        }

        let left = self.embedder.embed(&a);
        let right = self.embedder.embed(&b);

        let values = left
            .iter()
            .map(|u| right.iter().map(|v| cosine(u, v)).collect())
            .collect();

        Ok(SimilarityMatrix { values, cols: b.len() })
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(Arc::new(HashedNgramEmbedder::default()))
    }
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("dimensions", &self.embedder.dimensions())
            .finish()
    }
}

/// Cosine similarity clamped to [-1, 1]; 0 when either vector is zero
///
/// Symmetric bit-for-bit: `cosine(a, b) == cosine(b, a)`.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_items_score_one() {
        let engine = SimilarityEngine::default();
        let sim = engine.similarity("employee: name", "employee: name").unwrap();

        assert_eq!(sim.n_rows(), 1);
        assert_eq!(sim.n_cols(), 1);
        assert!((sim.get(0, 0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shape_and_range() {
        let engine = SimilarityEngine::default();
        let a = strings(&["employee: name", "shop: district", "pets: pet age"]);
        let b = strings(&["employee: age", "hiring: bonus"]);
        let sim = engine.similarity(&a, &b).unwrap();

        assert_eq!(sim.n_rows(), 3);
        assert_eq!(sim.n_cols(), 2);
        for row in sim.rows() {
            assert!(row.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
        assert_eq!(sim.row_max().len(), 3);
        assert_eq!(sim.col_max().len(), 2);
    }

    #[test]
    fn symmetric() {
        let engine = SimilarityEngine::default();
        let a = strings(&["employee: name", "shop: district"]);
        let b = strings(&["employee: age", "shop: location", "pets"]);

        let ab = engine.similarity(&a, &b).unwrap();
        let ba = engine.similarity(&b, &a).unwrap();
        for i in 0..a.len() {
            for j in 0..b.len() {
                assert_eq!(ab.get(i, j), ba.get(j, i));
            }
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let engine = SimilarityEngine::default();
        let err = engine.similarity(Vec::<String>::new(), "pets").unwrap_err();
        assert!(matches!(err, RecommendError::EmptyInput(_)));

        let err = engine.similarity("pets", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, RecommendError::EmptyInput(_)));
    }

    #[test]
    fn cosine_of_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0, 0.0], &[3.0, 0.0]), 1.0);
        assert_eq!(cosine(&[1.0, 0.0], &[-1.0, 0.0]), -1.0);
    }
}
