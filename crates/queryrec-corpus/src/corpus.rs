//! The reference corpus: database schemas plus decoded reference queries
//!
//! Loaded once per process and read-only afterwards; safe to share across
//! threads.

use crate::spider::{SpiderDatabase, SpiderQuery};
use queryrec_core::{ColumnKind, CorpusPaths, DatabaseSchema, QueryFacts};
use queryrec_sql::SqlFactExtractor;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// An immutable corpus entry
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceQuery {
    /// Owning database
    pub db_id: String,

    /// Raw SQL
    pub sql: String,

    /// Natural-language question, when the corpus carries one
    pub question: Option<String>,

    /// Decoded clauses; None when the SQL could not be decoded
    pub facts: Option<QueryFacts>,
}

/// Reference databases and queries
#[derive(Debug, Clone)]
pub struct SchemaCorpus {
    databases: Vec<DatabaseSchema>,
    normalized_names: Vec<String>,
    by_id: HashMap<String, usize>,
    queries: Vec<ReferenceQuery>,
}

impl SchemaCorpus {
    /// Load the schema and query files and decode every query
    pub fn load(paths: &CorpusPaths, extractor: &dyn SqlFactExtractor) -> Result<Self, CorpusError> {
        let databases = SpiderDatabase::load_all(&paths.schema_path)?
            .iter()
            .map(SpiderDatabase::to_schema)
            .collect::<Result<Vec<_>, _>>()?;

        let mut queries = Vec::new();
        for (row, entry) in SpiderQuery::load_all(&paths.query_path)?.into_iter().enumerate() {
            let Some(sql) = entry.sql_text().map(str::to_string) else {
                tracing::warn!(row, db = %entry.db_id, "reference row has no SQL text, skipping");
                continue;
            };
            queries.push((entry.db_id, sql, entry.question));
        }

        let corpus = Self::from_parts(databases, queries, extractor)?;
        tracing::info!(
            databases = corpus.databases.len(),
            queries = corpus.queries.len(),
            decoded = corpus.decoded_count(),
            "reference corpus loaded"
        );
        Ok(corpus)
    }

    /// Build a corpus from in-memory schemas and `(db_id, sql, question)` rows
    pub fn from_parts(
        databases: Vec<DatabaseSchema>,
        rows: Vec<(String, String, Option<String>)>,
        extractor: &dyn SqlFactExtractor,
    ) -> Result<Self, CorpusError> {
        let mut by_id = HashMap::new();
        for (i, db) in databases.iter().enumerate() {
            if by_id.insert(db.db_id.clone(), i).is_some() {
                return Err(CorpusError::DuplicateDatabase(db.db_id.clone()));
            }
        }

        let mut queries = Vec::with_capacity(rows.len());
        for (db_id, sql, question) in rows {
            let Some(&db_index) = by_id.get(&db_id) else {
                return Err(CorpusError::UnknownDatabase(db_id));
            };

            let facts = match extractor.extract(&sql, &databases[db_index]) {
                Ok(facts) => Some(facts),
                Err(e) => {
                    tracing::warn!(db = %db_id, error = %e, "could not decode reference query");
                    None
                }
            };

            queries.push(ReferenceQuery { db_id, sql, question, facts });
        }

        let normalized_names = databases.iter().map(|db| normalize_db_name(&db.db_id)).collect();

        Ok(Self {
            databases,
            normalized_names,
            by_id,
            queries,
        })
    }

    /// All database schemas in file order
    pub fn databases(&self) -> &[DatabaseSchema] {
        &self.databases
    }

    /// Display names used for topic matching, aligned with `databases()`
    pub fn normalized_names(&self) -> &[String] {
        &self.normalized_names
    }

    /// Schema of one database
    pub fn database(&self, db_id: &str) -> Option<&DatabaseSchema> {
        self.by_id.get(db_id).map(|&i| &self.databases[i])
    }

    /// All reference queries in file order
    pub fn queries(&self) -> &[ReferenceQuery] {
        &self.queries
    }

    /// One reference query by corpus index
    pub fn query(&self, index: usize) -> Option<&ReferenceQuery> {
        self.queries.get(index)
    }

    /// Decoded facts of one reference query
    pub fn facts(&self, index: usize) -> Option<&QueryFacts> {
        self.queries.get(index).and_then(|q| q.facts.as_ref())
    }

    /// `(corpus index, query)` for every query owned by one of `db_ids`
    pub fn queries_for<'a>(
        &'a self,
        db_ids: &'a [String],
    ) -> impl Iterator<Item = (usize, &'a ReferenceQuery)> + 'a {
        self.queries
            .iter()
            .enumerate()
            .filter(move |(_, q)| db_ids.iter().any(|id| id == &q.db_id))
    }

    /// Type tag of a column label within one database
    pub fn column_kind(&self, db_id: &str, label: &str) -> Option<ColumnKind> {
        self.database(db_id)?.column_kind(label)
    }

    /// Number of queries that decoded successfully
    pub fn decoded_count(&self) -> usize {
        self.queries.iter().filter(|q| q.facts.is_some()).count()
    }
}

/// Database name as compared against topics: underscores become spaces,
/// digits are removed, then trimmed and lower-cased
pub fn normalize_db_name(name: &str) -> String {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static pattern"));

    digits
        .replace_all(&name.replace('_', " "), "")
        .trim()
        .to_lowercase()
}

/// Corpus loading errors
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Failed to read corpus file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse corpus JSON {0}: {1}")]
    ParseError(String, String),

    #[error("Malformed schema for database '{db_id}': {reason}")]
    MalformedSchema { db_id: String, reason: String },

    #[error("Database '{0}' is defined twice")]
    DuplicateDatabase(String),

    #[error("Reference query belongs to unknown database '{0}'")]
    UnknownDatabase(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use queryrec_core::{SchemaColumn, TableSchema};
    use queryrec_sql::SqlParserExtractor;

    fn schema(db_id: &str) -> DatabaseSchema {
        DatabaseSchema::new(
            db_id,
            vec![TableSchema {
                name: "shop".to_string(),
                display_name: "shop".to_string(),
                columns: vec![SchemaColumn {
                    name: "Name".to_string(),
                    display_name: "name".to_string(),
                    kind: ColumnKind::Nominal,
                }],
            }],
        )
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_db_name("employee_hire_evaluation"), "employee hire evaluation");
        assert_eq!(normalize_db_name("pets_1"), "pets");
        assert_eq!(normalize_db_name("Car_1_Stats"), "car  stats");
    }

    #[test]
    fn decodes_at_construction() {
        let corpus = SchemaCorpus::from_parts(
            vec![schema("shop_1")],
            vec![
                ("shop_1".to_string(), "SELECT name FROM shop".to_string(), None),
                ("shop_1".to_string(), "SELECT FROM WHERE".to_string(), None),
            ],
            &SqlParserExtractor::default(),
        )
        .unwrap();

        assert_eq!(corpus.queries().len(), 2);
        assert_eq!(corpus.decoded_count(), 1);
        assert_eq!(corpus.facts(0).unwrap().select, vec!["shop: name".to_string()]);
        assert!(corpus.facts(1).is_none());
        assert_eq!(corpus.normalized_names(), &["shop".to_string()][..]);
        assert_eq!(corpus.column_kind("shop_1", "shop: name"), Some(ColumnKind::Nominal));
    }

    #[test]
    fn unknown_and_duplicate_databases() {
        let extractor = SqlParserExtractor::default();

        let err = SchemaCorpus::from_parts(
            vec![schema("a")],
            vec![("b".to_string(), "SELECT 1".to_string(), None)],
            &extractor,
        )
        .unwrap_err();
        assert!(matches!(err, CorpusError::UnknownDatabase(id) if id == "b"));

        let err = SchemaCorpus::from_parts(vec![schema("a"), schema("a")], vec![], &extractor)
            .unwrap_err();
        assert!(matches!(err, CorpusError::DuplicateDatabase(_)));
    }

    #[test]
    fn queries_by_database() {
        let corpus = SchemaCorpus::from_parts(
            vec![schema("a"), schema("b")],
            vec![
                ("a".to_string(), "SELECT name FROM shop".to_string(), None),
                ("b".to_string(), "SELECT name FROM shop".to_string(), None),
                ("a".to_string(), "SELECT * FROM shop".to_string(), None),
            ],
            &SqlParserExtractor::default(),
        )
        .unwrap();

        let wanted = vec!["a".to_string()];
        let indices: Vec<usize> = corpus.queries_for(&wanted).map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
