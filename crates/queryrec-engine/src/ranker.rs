//! History-aware re-ranking of the remaining columns
//!
//! Every past selection step votes for the columns not yet selected, with a
//! semantic component (label similarity) and a database-relevance component
//! (cosine between 0/1 row vectors of the matrix). Older steps are discounted
//! by `alpha` per step.

use crate::similarity::{cosine, SimilarityEngine};
use queryrec_core::{BinaryRelevanceMatrix, Result, Thresholds};
use std::cmp::Ordering;

/// A remaining column and its accumulated score
#[derive(Debug, Clone, PartialEq)]
pub struct RankedColumn {
    pub column: String,
    pub score: f32,
}

/// Output of `ContextRanker::rank_and_narrow`
#[derive(Debug, Clone)]
pub struct Narrowing {
    /// Matrix restricted to history columns followed by the top-ranked
    /// remaining columns
    pub matrix: BinaryRelevanceMatrix,

    /// History columns present in the original matrix, first-seen order
    pub history_columns: Vec<String>,

    /// Top-ranked remaining columns, best first
    pub ranked: Vec<RankedColumn>,

    /// Mining support for the narrowed matrix
    pub min_support: f32,
}

/// Re-ranks columns against a selection history
pub struct ContextRanker<'a> {
    similarity: &'a SimilarityEngine,
    thresholds: Thresholds,
}

impl<'a> ContextRanker<'a> {
    pub fn new(similarity: &'a SimilarityEngine, thresholds: &Thresholds) -> Self {
        Self {
            similarity,
            thresholds: *thresholds,
        }
    }

    /// Score every column not in `history`, keep the best `top_n` and narrow
    /// the matrix to history plus those columns
    pub fn rank_and_narrow(
        &self,
        matrix: &BinaryRelevanceMatrix,
        history: &[Vec<String>],
        top_n: usize,
    ) -> Result<Narrowing> {
        let mut history_columns: Vec<String> = Vec::new();
        for column in history.iter().flatten() {
            if !history_columns.contains(column) {
                history_columns.push(column.clone());
            }
        }

        let remaining: Vec<String> = matrix
            .columns()
            .iter()
            .filter(|c| !history_columns.contains(c))
            .cloned()
            .collect();

        let scores = self.score(matrix, history, &remaining)?;

        let mut ranked: Vec<RankedColumn> = remaining
            .into_iter()
            .zip(scores)
            .map(|(column, score)| RankedColumn { column, score })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(top_n);

        let history_in_matrix: Vec<String> = history_columns
            .iter()
            .filter(|c| matrix.contains_column(c))
            .cloned()
            .collect();

        let mut keep = history_in_matrix.clone();
        keep.extend(ranked.iter().map(|r| r.column.clone()));

        let min_support = self.thresholds.decayed_support(history.len());

        tracing::debug!(
            steps = history.len(),
            ranked = ranked.len(),
            min_support,
            "narrowed matrix to history and top-ranked columns"
        );

        Ok(Narrowing {
            matrix: matrix.select(&keep),
            history_columns: history_in_matrix,
            ranked,
            min_support,
        })
    }

    /// Accumulated `semantic + beta * db_relevance` per remaining column
    fn score(
        &self,
        matrix: &BinaryRelevanceMatrix,
        history: &[Vec<String>],
        remaining: &[String],
    ) -> Result<Vec<f32>> {
        let mut totals = vec![0.0f32; remaining.len()];
        if remaining.is_empty() {
            return Ok(totals);
        }

        let remaining_vectors: Vec<Vec<f32>> = remaining
            .iter()
            .map(|c| matrix.column_vector(c).unwrap_or_default())
            .collect();

        let weights = decay_weights(self.thresholds.alpha, history.len());
        for (step, weight) in history.iter().zip(weights) {
            if step.is_empty() {
                continue;
            }

            let semantic = self.similarity.similarity(remaining, step)?.row_max();

            let step_vectors: Vec<Vec<f32>> =
                step.iter().filter_map(|c| matrix.column_vector(c)).collect();

            for (i, total) in totals.iter_mut().enumerate() {
                let relevance = step_vectors
                    .iter()
                    .map(|v| cosine(&remaining_vectors[i], v))
                    .fold(0.0f32, f32::max);

                *total += semantic[i] * weight + self.thresholds.beta * relevance * weight;
            }
        }

        Ok(totals)
    }
}

/// Weight of each history step: `alpha^(steps after it)`, most recent = 1
pub fn decay_weights(alpha: f32, steps: usize) -> Vec<f32> {
    (0..steps)
        .map(|i| alpha.powi((steps - i - 1) as i32))
        .collect()
}
