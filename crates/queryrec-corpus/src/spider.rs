//! Spider dataset file formats
//!
//! Parses `tables.json` and the reference query files (subset of fields we
//! care about).

use crate::corpus::CorpusError;
use queryrec_core::{ColumnKind, DatabaseSchema, SchemaColumn, TableSchema};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One database entry of tables.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiderDatabase {
    /// Database identifier (e.g., "employee_hire_evaluation")
    pub db_id: String,

    /// Human-readable table names
    pub table_names: Vec<String>,

    /// Table names as written in SQL
    pub table_names_original: Vec<String>,

    /// `[table index, human-readable name]`; index -1 is the global `*`
    pub column_names: Vec<(i64, String)>,

    /// `[table index, name as written in SQL]`
    pub column_names_original: Vec<(i64, String)>,

    /// Declared column types (`number`, `text`, `time`, `boolean`, `others`)
    #[serde(default)]
    pub column_types: Vec<String>,
}

impl SpiderDatabase {
    /// Convert to the shared schema model, tagging each column once
    pub fn to_schema(&self) -> Result<DatabaseSchema, CorpusError> {
        if self.table_names.len() != self.table_names_original.len()
            || self.column_names.len() != self.column_names_original.len()
        {
            return Err(CorpusError::MalformedSchema {
                db_id: self.db_id.clone(),
                reason: "natural and original name lists differ in length".to_string(),
            });
        }

        let mut tables: Vec<TableSchema> = self
            .table_names_original
            .iter()
            .zip(self.table_names.iter())
            .map(|(name, display)| TableSchema {
                name: name.clone(),
                display_name: display.trim().to_lowercase(),
                columns: Vec::new(),
            })
            .collect();

        for (i, ((table_idx, display), (_, original))) in self
            .column_names
            .iter()
            .zip(self.column_names_original.iter())
            .enumerate()
        {
            let Ok(table_idx) = usize::try_from(*table_idx) else {
                continue; // the global "*"
            };
            let Some(table) = tables.get_mut(table_idx) else {
                return Err(CorpusError::MalformedSchema {
                    db_id: self.db_id.clone(),
                    reason: format!("column '{}' references missing table {}", original, table_idx),
                });
            };

            let kind = self
                .column_types
                .get(i)
                .map(|t| ColumnKind::from_declared(t))
                .unwrap_or(ColumnKind::Nominal);

            table.columns.push(SchemaColumn {
                name: original.clone(),
                display_name: display.trim().to_lowercase(),
                kind,
            });
        }

        Ok(DatabaseSchema::new(self.db_id.clone(), tables))
    }

    /// Load every entry of a tables.json file
    pub fn load_all(path: &Path) -> Result<Vec<Self>, CorpusError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CorpusError::IoError(path.display().to_string(), e.to_string()))?;

        serde_json::from_str(&contents)
            .map_err(|e| CorpusError::ParseError(path.display().to_string(), e.to_string()))
    }
}

/// One row of a reference query file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiderQuery {
    /// Owning database
    pub db_id: String,

    /// Raw SQL text
    #[serde(default)]
    pub query: Option<String>,

    /// Decoded SQL object, or raw SQL in corpora without `query`
    #[serde(default)]
    pub sql: Option<serde_json::Value>,

    /// Natural-language question the query answers
    #[serde(default)]
    pub question: Option<String>,
}

impl SpiderQuery {
    /// Raw SQL text, preferring `query` over a string-valued `sql`
    pub fn sql_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .or_else(|| self.sql.as_ref().and_then(|v| v.as_str()))
    }

    /// Load every row of a query file
    pub fn load_all(path: &Path) -> Result<Vec<Self>, CorpusError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CorpusError::IoError(path.display().to_string(), e.to_string()))?;

        serde_json::from_str(&contents)
            .map_err(|e| CorpusError::ParseError(path.display().to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TABLES: &str = r#"[{
        "db_id": "pets_1",
        "table_names": ["student", "has pet"],
        "table_names_original": ["Student", "Has_Pet"],
        "column_names": [[-1, "*"], [0, "stu id"], [0, "age"], [1, "pet id"], [1, "Since"]],
        "column_names_original": [[-1, "*"], [0, "StuID"], [0, "Age"], [1, "PetID"], [1, "Since"]],
        "column_types": ["text", "number", "number", "number", "time"],
        "primary_keys": [1],
        "foreign_keys": [[3, 1]]
    }]"#;

    #[test]
    fn schema_conversion() {
        let dbs: Vec<SpiderDatabase> = serde_json::from_str(TABLES).unwrap();
        let schema = dbs[0].to_schema().unwrap();

        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.tables[1].display_name, "has pet");
        assert_eq!(schema.tables[1].columns[1].display_name, "since");
        assert_eq!(schema.tables[1].columns[1].kind, ColumnKind::Temporal);
        assert_eq!(schema.tables[0].columns[0].name, "StuID");
        assert_eq!(
            schema.labels(),
            vec!["student: stu id", "student: age", "has pet: pet id", "has pet: since", "student: *", "has pet: *"]
        );
    }

    #[test]
    fn malformed_schema() {
        let mut dbs: Vec<SpiderDatabase> = serde_json::from_str(TABLES).unwrap();
        dbs[0].column_names.push((7, "ghost".to_string()));
        dbs[0].column_names_original.push((7, "Ghost".to_string()));
        assert!(matches!(dbs[0].to_schema(), Err(CorpusError::MalformedSchema { .. })));
    }

    #[test]
    fn sql_text_fallbacks() {
        let rows: Vec<SpiderQuery> = serde_json::from_str(
            r#"[
                {"db_id": "a", "query": "SELECT 1", "sql": {"select": []}},
                {"db_id": "a", "sql": "SELECT 2"},
                {"db_id": "a", "sql": {"select": []}}
            ]"#,
        )
        .unwrap();

        assert_eq!(rows[0].sql_text(), Some("SELECT 1"));
        assert_eq!(rows[1].sql_text(), Some("SELECT 2"));
        assert_eq!(rows[2].sql_text(), None);
    }
}
