//! Binary relevance matrix (reference queries x target columns)

use serde::{Deserialize, Serialize};

/// Rows are reference queries relevant to a topic, columns are target column
/// labels. A cell is on when the query's SELECT list semantically matches the
/// column. Column order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct BinaryRelevanceMatrix {
    /// Ordered column labels
    columns: Vec<String>,

    /// One row per reference query, each `columns.len()` wide
    rows: Vec<Vec<bool>>,

    /// Corpus index of the reference query behind each row
    row_sources: Vec<usize>,

    /// Databases whose queries contributed rows
    #[serde(default)]
    databases: Vec<String>,
}

/// Wire form of a matrix, checked before it becomes a `BinaryRelevanceMatrix`
#[derive(Deserialize)]
struct RawMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<bool>>,
    row_sources: Vec<usize>,
    #[serde(default)]
    databases: Vec<String>,
}

impl TryFrom<RawMatrix> for BinaryRelevanceMatrix {
    type Error = String;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        let width = raw.columns.len();
        if let Some((index, row)) = raw.rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(format!(
                "row {} has {} cells but the matrix has {} columns",
                index,
                row.len(),
                width
            ));
        }
        if raw.row_sources.len() != raw.rows.len() {
            return Err(format!(
                "{} row sources for {} rows",
                raw.row_sources.len(),
                raw.rows.len()
            ));
        }

        Ok(Self {
            columns: raw.columns,
            rows: raw.rows,
            row_sources: raw.row_sources,
            databases: raw.databases,
        })
    }
}

impl BinaryRelevanceMatrix {
    /// Build a matrix, dropping cells beyond the column count and padding
    /// short rows with `false`
    pub fn new(columns: Vec<String>, rows: Vec<Vec<bool>>, row_sources: Vec<usize>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, false);
                row
            })
            .collect::<Vec<_>>();
        let mut row_sources = row_sources;
        row_sources.resize(rows.len(), usize::MAX);

        Self {
            columns,
            rows,
            row_sources,
            databases: Vec::new(),
        }
    }

    /// An empty matrix over the given columns
    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new(), Vec::new())
    }

    /// Record the databases the rows were drawn from
    pub fn with_databases(mut self, databases: Vec<String>) -> Self {
        self.databases = databases;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.rows
    }

    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Corpus index of the reference query behind row `row`
    pub fn row_source(&self, row: usize) -> Option<usize> {
        self.row_sources.get(row).copied().filter(|&s| s != usize::MAX)
    }

    /// Position of a column label
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Number of rows where the column is on
    pub fn column_count(&self, index: usize) -> usize {
        self.rows.iter().filter(|row| row[index]).count()
    }

    /// Column as a 0/1 vector over rows
    pub fn column_vector(&self, column: &str) -> Option<Vec<f32>> {
        let index = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .map(|row| if row[index] { 1.0 } else { 0.0 })
                .collect(),
        )
    }

    /// Reorder columns by descending on-count; ties keep their original order
    pub fn sorted_by_support(self) -> Self {
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        let counts: Vec<usize> = order.iter().map(|&i| self.column_count(i)).collect();
        order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));
        self.reorder(&order)
    }

    /// Restrict to the given columns, in the given order
    ///
    /// Labels not present in the matrix and repeated labels are ignored.
    pub fn select(&self, columns: &[String]) -> Self {
        let mut order = Vec::with_capacity(columns.len());
        for column in columns {
            if let Some(index) = self.column_index(column) {
                if !order.contains(&index) {
                    order.push(index);
                }
            }
        }
        self.clone().reorder(&order)
    }

    fn reorder(self, order: &[usize]) -> Self {
        let columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&i| row[i]).collect())
            .collect();

        Self {
            columns,
            rows,
            row_sources: self.row_sources,
            databases: self.databases,
        }
    }

    /// Rows where every listed column is on
    ///
    /// A label the matrix does not know matches no row.
    pub fn rows_matching_all(&self, columns: &[String]) -> Vec<usize> {
        let indices: Option<Vec<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let Some(indices) = indices else {
            return Vec::new();
        };

        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| indices.iter().all(|&i| row[i]))
            .map(|(r, _)| r)
            .collect()
    }
}
