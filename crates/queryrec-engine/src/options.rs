//! GROUP BY and aggregate suggestions for candidate column groups

use crate::similarity::SimilarityEngine;
use queryrec_core::{
    is_wildcard, AggOp, AggregateHints, BinaryRelevanceMatrix, QueryFacts, Result, Thresholds,
};
use queryrec_corpus::SchemaCorpus;
use std::cmp::Ordering;

/// Caller-supplied hints, pooled across session steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionContexts {
    pub groupby: Vec<String>,
    pub agg: AggregateHints,
}

/// Annotates column groups with GROUP BY and aggregate suggestions drawn
/// from the matching reference queries
pub struct OptionRecommender<'a> {
    corpus: &'a SchemaCorpus,
    similarity: &'a SimilarityEngine,
    thresholds: Thresholds,
}

impl<'a> OptionRecommender<'a> {
    pub fn new(
        corpus: &'a SchemaCorpus,
        similarity: &'a SimilarityEngine,
        thresholds: &Thresholds,
    ) -> Self {
        Self {
            corpus,
            similarity,
            thresholds: *thresholds,
        }
    }

    /// One GROUP BY list and one aggregate mapping per combo, index-aligned
    ///
    /// A combo with no fully matching row gets `([], {})`.
    pub fn suggest_options(
        &self,
        matrix: &BinaryRelevanceMatrix,
        combos: &[Vec<String>],
        contexts: &OptionContexts,
    ) -> Result<(Vec<Vec<String>>, Vec<AggregateHints>)> {
        let context_groupby = self.context_groupby(matrix, &contexts.groupby)?;

        let mut groupby = Vec::with_capacity(combos.len());
        let mut agg = Vec::with_capacity(combos.len());

        for combo in combos {
            let rows = matrix.rows_matching_all(combo);
            if rows.is_empty() || combo.is_empty() {
                groupby.push(Vec::new());
                agg.push(AggregateHints::new());
                continue;
            }

            let facts: Vec<&QueryFacts> = rows
                .iter()
                .filter_map(|&r| matrix.row_source(r))
                .filter_map(|source| self.corpus.facts(source))
                .collect();

            let mut suggestion = self.corpus_groupby(matrix, &facts, rows.len())?;
            for column in &context_groupby {
                if !suggestion.contains(column) {
                    suggestion.push(column.clone());
                }
            }
            groupby.push(suggestion);

            agg.push(self.aggregates(combo, &facts, rows.len(), &contexts.agg)?);
        }

        Ok((groupby, agg))
    }

    /// Explicit GROUP BY hints, then matrix columns close to them
    fn context_groupby(
        &self,
        matrix: &BinaryRelevanceMatrix,
        hints: &[String],
    ) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        for hint in hints {
            if !is_wildcard(hint) && !out.contains(hint) {
                out.push(hint.clone());
            }
        }
        if out.is_empty() {
            return Ok(out);
        }

        let candidates: Vec<String> = matrix
            .columns()
            .iter()
            .filter(|c| !is_wildcard(c) && !out.contains(c))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(out);
        }

        let scores = self.similarity.similarity(&candidates, &out)?.row_max();
        let ranked = ranked_above(&candidates, &scores, self.thresholds.context_sim);
        out.extend(ranked);
        Ok(out)
    }

    /// Matrix columns similar to the GROUP BY entities of matching queries,
    /// when enough of those queries group at all
    fn corpus_groupby(
        &self,
        matrix: &BinaryRelevanceMatrix,
        facts: &[&QueryFacts],
        n_matching: usize,
    ) -> Result<Vec<String>> {
        let grouping = facts.iter().filter(|f| !f.group_by.is_empty()).count();
        if (grouping as f32 / n_matching as f32) <= self.thresholds.groupby {
            return Ok(Vec::new());
        }

        let pooled = pool(facts.iter().map(|f| f.group_by.as_slice()));
        let candidates: Vec<String> = matrix
            .columns()
            .iter()
            .filter(|c| !is_wildcard(c))
            .cloned()
            .collect();
        if pooled.is_empty() || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.similarity.similarity(&candidates, &pooled)?.row_max();
        Ok(ranked_above(&candidates, &scores, self.thresholds.groupby))
    }

    fn aggregates(
        &self,
        combo: &[String],
        facts: &[&QueryFacts],
        n_matching: usize,
        hints: &AggregateHints,
    ) -> Result<AggregateHints> {
        let mut out = AggregateHints::new();

        for op in AggOp::ALL {
            let mut columns: Vec<String> = Vec::new();

            // Session hints for this operator
            if let Some(operands) = hints.get(&op).filter(|o| !o.is_empty()) {
                let scores = self.similarity.similarity(combo, operands)?.row_max();
                for (column, score) in combo.iter().zip(scores) {
                    if score > self.thresholds.item_sim && !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }

            // Operator usage among matching reference queries
            let using = facts.iter().filter(|f| !f.operands(op).is_empty()).count();
            if using as f32 / n_matching as f32 > self.thresholds.agg {
                let pooled = pool(facts.iter().map(|f| f.operands(op)));
                let scores = self.similarity.similarity(combo, &pooled)?.row_max();
                for (column, score) in combo.iter().zip(scores) {
                    if score > self.thresholds.agg && !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }

            if !columns.is_empty() {
                out.insert(op, columns);
            }
        }

        Ok(out)
    }
}

/// Candidates scoring above `threshold`, best first; ties keep their order
fn ranked_above(candidates: &[String], scores: &[f32], threshold: f32) -> Vec<String> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order
        .into_iter()
        .filter(|&i| scores[i] > threshold)
        .map(|i| candidates[i].clone())
        .collect()
}

fn pool<'f>(groups: impl Iterator<Item = &'f [String]>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for column in groups.flatten() {
        if !out.contains(column) {
            out.push(column.clone());
        }
    }
    out
}
