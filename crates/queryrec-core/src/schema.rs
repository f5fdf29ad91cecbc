//! Column labels, type tags, reference database schemas and aggregate operators

use serde::{Deserialize, Serialize};

/// A column identifier of the form `"<table>: <column>"`
///
/// `"<table>: *"` denotes the wildcard of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnLabel {
    /// Table display name
    pub table: String,

    /// Column display name, or `*`
    pub column: String,
}

impl ColumnLabel {
    /// Create a label from a table and column display name
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Wildcard label for a table
    pub fn wildcard(table: impl Into<String>) -> Self {
        Self::new(table, "*")
    }

    /// Parse `"table: column"`; returns None when the separator is missing
    pub fn parse(label: &str) -> Option<Self> {
        let (table, column) = label.split_once(':')?;
        Some(Self::new(table.trim(), column.trim()))
    }

    /// Whether this label is a table wildcard
    pub fn is_wildcard(&self) -> bool {
        self.column == "*"
    }
}

impl std::fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.table, self.column)
    }
}

/// Whether a rendered column label refers to a table wildcard
pub fn is_wildcard(label: &str) -> bool {
    label.contains('*')
}

/// Type tag assigned to a column once, at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Numeric values
    Quantitative,

    /// Categorical or free-text values
    Nominal,

    /// Dates and timestamps
    Temporal,
}

impl ColumnKind {
    /// Map a declared schema type (`number`, `time`, `text`, ...) to a tag
    pub fn from_declared(declared: &str) -> Self {
        match declared.trim().to_lowercase().as_str() {
            "number" | "int" | "integer" | "real" | "float" | "double" | "numeric" | "decimal" => {
                Self::Quantitative
            }
            "time" | "date" | "datetime" | "timestamp" => Self::Temporal,
            _ => Self::Nominal,
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quantitative => write!(f, "quantitative"),
            Self::Nominal => write!(f, "nominal"),
            Self::Temporal => write!(f, "temporal"),
        }
    }
}

/// A column of a reference database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Name as written in SQL
    pub name: String,

    /// Human-readable name used in labels
    pub display_name: String,

    /// Type tag assigned at ingestion
    pub kind: ColumnKind,
}

/// A table of a reference database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Name as written in SQL
    pub name: String,

    /// Human-readable name used in labels
    pub display_name: String,

    /// Columns in declaration order
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    /// Find a column by its SQL name (case-insensitive)
    pub fn find_column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Label for one of this table's columns
    pub fn label(&self, column: &SchemaColumn) -> ColumnLabel {
        ColumnLabel::new(&self.display_name, &column.display_name)
    }

    /// Wildcard label for this table
    pub fn wildcard(&self) -> ColumnLabel {
        ColumnLabel::wildcard(&self.display_name)
    }
}

/// Table and column metadata of one reference database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    /// Database identifier
    pub db_id: String,

    /// Tables in declaration order
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    pub fn new(db_id: impl Into<String>, tables: Vec<TableSchema>) -> Self {
        Self {
            db_id: db_id.into(),
            tables,
        }
    }

    /// Find a table by its SQL name (case-insensitive)
    pub fn find_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Every column label of the database, wildcards last
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .tables
            .iter()
            .flat_map(|t| t.columns.iter().map(move |c| t.label(c).to_string()))
            .collect();
        labels.extend(self.tables.iter().map(|t| t.wildcard().to_string()));
        labels
    }

    /// Type tag of a rendered label, None for wildcards and unknown labels
    pub fn column_kind(&self, label: &str) -> Option<ColumnKind> {
        let parsed = ColumnLabel::parse(label)?;
        let table = self.tables.iter().find(|t| t.display_name == parsed.table)?;
        table
            .columns
            .iter()
            .find(|c| c.display_name == parsed.column)
            .map(|c| c.kind)
    }
}

/// Aggregate operators recognized in SELECT lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOp {
    Max,
    Min,
    Count,
    Sum,
    Avg,
}

impl AggOp {
    /// All operators, in suggestion order
    pub const ALL: [AggOp; 5] = [AggOp::Max, AggOp::Min, AggOp::Count, AggOp::Sum, AggOp::Avg];

    /// Match a SQL function name (case-insensitive)
    pub fn from_function_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Min => "min",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
        }
    }
}

impl std::fmt::Display for AggOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
