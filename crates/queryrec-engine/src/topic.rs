//! Topic search: relevant databases and the binary relevance matrix

use crate::similarity::SimilarityEngine;
use queryrec_core::{BinaryRelevanceMatrix, RecommendError, Result};
use queryrec_corpus::SchemaCorpus;
use serde::Serialize;

/// Database kept by a topic search, with its name similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseMatch {
    pub db_id: String,
    pub score: f32,
}

/// Finds reference databases similar to a topic and marks which of their
/// queries select each target column
pub struct TopicMatcher<'a> {
    corpus: &'a SchemaCorpus,
    similarity: &'a SimilarityEngine,
}

impl<'a> TopicMatcher<'a> {
    pub fn new(corpus: &'a SchemaCorpus, similarity: &'a SimilarityEngine) -> Self {
        Self { corpus, similarity }
    }

    /// Databases whose normalized name scores above `topic_threshold`, in
    /// corpus order
    pub fn match_databases(&self, topic: &str, topic_threshold: f32) -> Result<Vec<DatabaseMatch>> {
        let names = self.corpus.normalized_names();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.similarity.similarity(topic, names)?;
        Ok(self
            .corpus
            .databases()
            .iter()
            .zip(&scores.rows()[0])
            .filter(|(_, score)| **score > topic_threshold)
            .map(|(db, &score)| DatabaseMatch {
                db_id: db.db_id.clone(),
                score,
            })
            .collect())
    }

    /// Build the matrix of kept-database queries against `target_columns`
    ///
    /// A cell is on when the best similarity between the column and any
    /// SELECT entity of the query exceeds `item_threshold`. Columns come out
    /// ordered by descending on-count. Zero kept databases give a matrix
    /// with zero rows.
    pub fn search_sim_dbs(
        &self,
        topic: &str,
        target_columns: &[String],
        topic_threshold: f32,
        item_threshold: f32,
    ) -> Result<BinaryRelevanceMatrix> {
        if target_columns.is_empty() {
            return Err(RecommendError::EmptyInput("target columns"));
        }

        let matches = self.match_databases(topic, topic_threshold)?;
        tracing::debug!(topic, databases = matches.len(), "topic matched");
        self.relevance_matrix(&matches, target_columns, item_threshold)
    }

    /// Matrix over the queries of already matched databases
    pub fn relevance_matrix(
        &self,
        matches: &[DatabaseMatch],
        target_columns: &[String],
        item_threshold: f32,
    ) -> Result<BinaryRelevanceMatrix> {
        if target_columns.is_empty() {
            return Err(RecommendError::EmptyInput("target columns"));
        }

        let db_ids: Vec<String> = matches.iter().map(|m| m.db_id.clone()).collect();

        let mut rows = Vec::new();
        let mut sources = Vec::new();
        for (index, query) in self.corpus.queries_for(&db_ids) {
            let Some(facts) = query.facts.as_ref().filter(|f| !f.select.is_empty()) else {
                continue;
            };

            let best = self.similarity.similarity(target_columns, &facts.select)?.row_max();
            rows.push(best.iter().map(|&s| s > item_threshold).collect());
            sources.push(index);
        }

        tracing::info!(
            databases = ?db_ids,
            rows = rows.len(),
            columns = target_columns.len(),
            "topic search complete"
        );

        Ok(BinaryRelevanceMatrix::new(target_columns.to_vec(), rows, sources)
            .with_databases(db_ids)
            .sorted_by_support())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use queryrec_core::{ColumnKind, DatabaseSchema, SchemaColumn, TableSchema};
    use queryrec_sql::SqlParserExtractor;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn schema(db_id: &str, table: &str, columns: &[&str]) -> DatabaseSchema {
        DatabaseSchema::new(
            db_id,
            vec![TableSchema {
                name: table.to_string(),
                display_name: table.to_string(),
                columns: columns
                    .iter()
                    .map(|c| SchemaColumn {
                        name: c.to_string(),
                        display_name: c.to_string(),
                        kind: ColumnKind::Nominal,
                    })
                    .collect(),
            }],
        )
    }

    fn corpus() -> SchemaCorpus {
        let row = |db: &str, sql: &str| (db.to_string(), sql.to_string(), None);
        SchemaCorpus::from_parts(
            vec![
                schema("employee_hire_evaluation", "employee", &["name", "age", "city"]),
                schema("pets_1", "pets", &["weight"]),
            ],
            vec![
                row("employee_hire_evaluation", "SELECT name FROM employee"),
                row("employee_hire_evaluation", "SELECT name, city FROM employee"),
                row("pets_1", "SELECT weight FROM pets"),
                row("employee_hire_evaluation", "SELECT city FROM employee"),
                row("employee_hire_evaluation", "SELECT city, age FROM employee"),
            ],
            &SqlParserExtractor::default(),
        )
        .unwrap()
    }

    #[test]
    fn topic_keeps_matching_database() {
        let corpus = corpus();
        let engine = SimilarityEngine::default();
        let matcher = TopicMatcher::new(&corpus, &engine);

        let matches = matcher.match_databases("employee hire evaluation", 0.4).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].db_id, "employee_hire_evaluation");
        assert!(matches[0].score > 0.99);
    }

    #[test]
    fn matrix_rows_and_column_order() {
        let corpus = corpus();
        let engine = SimilarityEngine::default();
        let matcher = TopicMatcher::new(&corpus, &engine);

        let targets = cols(&["employee: name", "employee: age", "employee: city"]);
        let m = matcher
            .search_sim_dbs("employee hire evaluation", &targets, 0.4, 0.95)
            .unwrap();

        // city:3, name:2, age:1
        assert_eq!(m.columns(), &cols(&["employee: city", "employee: name", "employee: age"])[..]);
        assert_eq!(m.n_rows(), 4);
        assert_eq!(m.rows()[0], vec![false, true, false]);
        assert_eq!(m.rows()[3], vec![true, false, true]);
        assert_eq!(m.row_source(2), Some(3));
        assert_eq!(m.databases(), &cols(&["employee_hire_evaluation"])[..]);
    }

    #[test]
    fn matrix_from_existing_matches() {
        let corpus = corpus();
        let engine = SimilarityEngine::default();
        let matcher = TopicMatcher::new(&corpus, &engine);
        let targets = cols(&["employee: name", "employee: city"]);

        let matches = matcher.match_databases("employee hire evaluation", 0.4).unwrap();
        let m = matcher.relevance_matrix(&matches, &targets, 0.95).unwrap();
        assert_eq!(
            m,
            matcher
                .search_sim_dbs("employee hire evaluation", &targets, 0.4, 0.95)
                .unwrap()
        );
    }

    #[test]
    fn no_matching_database_gives_empty_matrix() {
        let corpus = corpus();
        let engine = SimilarityEngine::default();
        let matcher = TopicMatcher::new(&corpus, &engine);

        let m = matcher
            .search_sim_dbs("zzqx", &cols(&["employee: name"]), 0.4, 0.4)
            .unwrap();
        assert!(m.is_empty());
        assert_eq!(m.n_cols(), 1);
    }

    #[test]
    fn empty_targets_are_rejected() {
        let corpus = corpus();
        let engine = SimilarityEngine::default();
        let matcher = TopicMatcher::new(&corpus, &engine);

        let err = matcher.search_sim_dbs("pets", &[], 0.4, 0.4).unwrap_err();
        assert!(matches!(err, RecommendError::EmptyInput(_)));
    }
}
