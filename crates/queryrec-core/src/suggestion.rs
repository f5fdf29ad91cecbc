//! Mined combos, session context and suggestion output

use crate::schema::AggOp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate operator -> operand columns
pub type AggregateHints = BTreeMap<AggOp, Vec<String>>;

/// Facts decoded from one reference query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFacts {
    /// Entities in the SELECT list (aggregate operands included)
    pub select: Vec<String>,

    /// Entities in the GROUP BY clause
    pub group_by: Vec<String>,

    /// Operands per aggregate operator
    pub aggregates: AggregateHints,
}

impl QueryFacts {
    /// Operands used with `op`, empty if the query does not use it
    pub fn operands(&self, op: AggOp) -> &[String] {
        self.aggregates.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A mined column combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentCombo {
    /// Columns in matrix order
    pub items: Vec<String>,

    /// Fraction of rows where every item is on
    pub support: f32,
}

impl FrequentCombo {
    pub fn new(items: Vec<String>, support: f32) -> Self {
        Self { items, support }
    }

    /// Number of columns in the combo
    pub fn itemlen(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.items.iter().any(|c| c == column)
    }

    /// True if every item is in `columns`
    pub fn is_subset_of(&self, columns: &[String]) -> bool {
        self.items.iter().all(|c| columns.contains(c))
    }
}

/// Caller-held session context
///
/// Grows monotonically within one recommendation session. The engine never
/// keeps a copy between calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDict {
    /// Previously selected column groups, most recent last
    #[serde(default)]
    pub select: Vec<Vec<String>>,

    /// GROUP BY hints, one group per step
    #[serde(default)]
    pub groupby: Vec<Vec<String>>,

    /// Aggregate hints, one mapping per step
    #[serde(default)]
    pub agg: Vec<AggregateHints>,
}

impl ContextDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// No column group has been selected yet
    pub fn is_initial(&self) -> bool {
        self.select.iter().all(Vec::is_empty)
    }

    /// Append a selected column group
    pub fn push_selection(&mut self, columns: Vec<String>) {
        self.select.push(columns);
    }

    /// Every history column once, in first-seen order
    pub fn history_columns(&self) -> Vec<String> {
        dedup_flatten(&self.select)
    }

    /// Every GROUP BY hint once, in first-seen order
    pub fn groupby_columns(&self) -> Vec<String> {
        dedup_flatten(&self.groupby)
    }

    /// Operands named for `op` across all steps
    pub fn agg_operands(&self, op: AggOp) -> Vec<String> {
        let per_step: Vec<Vec<String>> = self
            .agg
            .iter()
            .filter_map(|hints| hints.get(&op).cloned())
            .collect();
        dedup_flatten(&per_step)
    }
}

fn dedup_flatten(groups: &[Vec<String>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for column in groups.iter().flatten() {
        if !out.contains(column) {
            out.push(column.clone());
        }
    }
    out
}

/// Index-aligned suggestions: entry `i` of each list describes combo `i`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    /// Candidate column groups for the next SELECT
    pub select: Vec<Vec<String>>,

    /// GROUP BY suggestions per combo
    pub groupby: Vec<Vec<String>>,

    /// Aggregate suggestions per combo
    pub agg: Vec<AggregateHints>,
}

impl SuggestionResult {
    pub fn len(&self) -> usize {
        self.select.len()
    }

    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
    }

    /// Add one combo with its annotations
    pub fn push(&mut self, select: Vec<String>, groupby: Vec<String>, agg: AggregateHints) {
        self.select.push(select);
        self.groupby.push(groupby);
        self.agg.push(agg);
    }

    /// Iterate `(select, groupby, agg)` triples
    pub fn entries(&self) -> impl Iterator<Item = (&Vec<String>, &Vec<String>, &AggregateHints)> {
        self.select
            .iter()
            .zip(self.groupby.iter())
            .zip(self.agg.iter())
            .map(|((s, g), a)| (s, g, a))
    }
}
