//! Maximal frequent itemset mining over a binary relevance matrix
//!
//! Depth-first search over vertical tidsets (row-index lists). Items are
//! visited in matrix column order, so the search enumerates itemsets in
//! lexicographic order and a leaf that is not contained in an earlier
//! maximal set is itself maximal.

use queryrec_core::{BinaryRelevanceMatrix, FrequentCombo, RecommendError, Result};
use std::cmp::Ordering;

/// Tolerance for float support comparisons (`support >= min_support`)
const SUPPORT_EPSILON: f32 = 1e-6;

/// Mines maximal frequent column combos
#[derive(Debug, Clone, Copy)]
pub struct ComboMiner {
    min_support: f32,
}

impl ComboMiner {
    /// Support must be within (0, 1]
    pub fn new(min_support: f32) -> Result<Self> {
        if !(min_support > 0.0 && min_support <= 1.0) {
            return Err(RecommendError::configuration(format!(
                "min_support must be within (0, 1], got {}",
                min_support
            )));
        }
        Ok(Self { min_support })
    }

    pub fn min_support(&self) -> f32 {
        self.min_support
    }

    /// Maximal frequent combos, longest first, then by support
    ///
    /// Combos that are entirely contained in `exclude` are dropped. Items
    /// within a combo follow matrix column order.
    pub fn mine(
        &self,
        matrix: &BinaryRelevanceMatrix,
        exclude: &[String],
    ) -> Result<Vec<FrequentCombo>> {
        if matrix.is_empty() {
            return Err(RecommendError::InsufficientData(
                "cannot mine a matrix with zero rows".to_string(),
            ));
        }

        let n_rows = matrix.n_rows();
        let roots: Vec<(usize, Vec<usize>)> = (0..matrix.n_cols())
            .map(|col| (col, tidset(matrix, col)))
            .filter(|(_, tids)| self.is_frequent(tids.len(), n_rows))
            .collect();

        let mut maximal: Vec<(Vec<usize>, usize)> = Vec::new();
        let mut prefix = Vec::new();
        self.extend(&mut prefix, &roots, n_rows, &mut maximal);

        let mut combos: Vec<FrequentCombo> = maximal
            .into_iter()
            .map(|(items, count)| {
                FrequentCombo::new(
                    items.iter().map(|&i| matrix.columns()[i].clone()).collect(),
                    count as f32 / n_rows as f32,
                )
            })
            .filter(|combo| exclude.is_empty() || !combo.is_subset_of(exclude))
            .collect();

        sort_combos(&mut combos);

        tracing::debug!(
            rows = n_rows,
            columns = matrix.n_cols(),
            min_support = self.min_support,
            combos = combos.len(),
            "mined maximal combos"
        );

        Ok(combos)
    }

    /// Pad with single unused columns until there are `top_n` combos
    ///
    /// Only applies when the mined combos cover fewer than `top_n` distinct
    /// columns. Padding columns are taken in matrix order.
    pub fn pad_with_singletons(
        &self,
        matrix: &BinaryRelevanceMatrix,
        mut combos: Vec<FrequentCombo>,
        top_n: usize,
    ) -> Vec<FrequentCombo> {
        let mut covered: Vec<&String> = Vec::new();
        for item in combos.iter().flat_map(|c| c.items.iter()) {
            if !covered.contains(&item) {
                covered.push(item);
            }
        }
        if covered.len() >= top_n {
            return combos;
        }

        let unused: Vec<String> = matrix
            .columns()
            .iter()
            .filter(|c| !covered.contains(c))
            .cloned()
            .collect();

        for column in unused {
            if combos.len() >= top_n {
                break;
            }
            let support = column_support(matrix, &column);
            combos.push(FrequentCombo::new(vec![column], support));
        }

        combos
    }

    fn is_frequent(&self, count: usize, n_rows: usize) -> bool {
        count as f32 / n_rows as f32 + SUPPORT_EPSILON >= self.min_support
    }

    /// `candidates` are the items after the last prefix item that stay
    /// frequent together with the prefix, each with its joint tidset
    fn extend(
        &self,
        prefix: &mut Vec<usize>,
        candidates: &[(usize, Vec<usize>)],
        n_rows: usize,
        maximal: &mut Vec<(Vec<usize>, usize)>,
    ) {
        // Everything below is a subset of prefix + candidates
        let mut head_tail: Vec<usize> = prefix.clone();
        head_tail.extend(candidates.iter().map(|(item, _)| *item));
        if maximal.iter().any(|(set, _)| is_subset(&head_tail, set)) {
            return;
        }

        for (k, (item, tids)) in candidates.iter().enumerate() {
            prefix.push(*item);

            let next: Vec<(usize, Vec<usize>)> = candidates[k + 1..]
                .iter()
                .filter_map(|(other, other_tids)| {
                    let joint = intersect(tids, other_tids);
                    self.is_frequent(joint.len(), n_rows).then_some((*other, joint))
                })
                .collect();

            if next.is_empty() {
                if !maximal.iter().any(|(set, _)| is_subset(prefix, set)) {
                    maximal.push((prefix.clone(), tids.len()));
                }
            } else {
                self.extend(prefix, &next, n_rows, maximal);
            }

            prefix.pop();
        }
    }
}

/// Longest first, then highest support; stable for ties
pub fn sort_combos(combos: &mut [FrequentCombo]) {
    combos.sort_by(|a, b| {
        b.itemlen()
            .cmp(&a.itemlen())
            .then_with(|| b.support.partial_cmp(&a.support).unwrap_or(Ordering::Equal))
    });
}

/// Fraction of rows where `column` is on; 0 for unknown columns or an
/// empty matrix
pub fn column_support(matrix: &BinaryRelevanceMatrix, column: &str) -> f32 {
    match matrix.column_index(column) {
        Some(index) if !matrix.is_empty() => {
            matrix.column_count(index) as f32 / matrix.n_rows() as f32
        }
        _ => 0.0,
    }
}

fn tidset(matrix: &BinaryRelevanceMatrix, col: usize) -> Vec<usize> {
    matrix
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row[col])
        .map(|(r, _)| r)
        .collect()
}

/// Intersection of two ascending index lists
fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Both lists ascending
fn is_subset(small: &[usize], large: &[usize]) -> bool {
    let mut it = large.iter();
    small.iter().all(|x| it.any(|y| y == x))
}
