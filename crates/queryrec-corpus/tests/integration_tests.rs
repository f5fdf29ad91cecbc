//! Integration tests for loading the Spider fixture corpus

use pretty_assertions::assert_eq;
use queryrec_core::{AggOp, ColumnKind, CorpusPaths, DialectConfig};
use queryrec_corpus::{CorpusError, SchemaCorpus};
use queryrec_sql::SqlParserExtractor;
use std::path::{Path, PathBuf};

fn fixture_paths() -> CorpusPaths {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/spider-mini");
    CorpusPaths {
        schema_path: root.join("tables.json"),
        query_path: root.join("train.json"),
    }
}

fn load() -> SchemaCorpus {
    SchemaCorpus::load(&fixture_paths(), &SqlParserExtractor::new(DialectConfig::Sqlite)).unwrap()
}

#[test]
fn loads_fixture_corpus() {
    let corpus = load();

    assert_eq!(corpus.databases().len(), 2);
    assert_eq!(corpus.queries().len(), 18);
    assert_eq!(corpus.decoded_count(), 18);
    assert_eq!(
        corpus.normalized_names(),
        &["employee hire evaluation".to_string(), "pets".to_string()][..]
    );
}

#[test]
fn facts_are_resolved_to_display_labels() {
    let corpus = load();

    let facts = corpus.facts(2).unwrap();
    assert_eq!(facts.select, vec!["employee: *", "employee: city"]);
    assert_eq!(facts.group_by, vec!["employee: city"]);
    assert_eq!(facts.operands(AggOp::Count), &["employee: *".to_string()][..]);

    let facts = corpus.facts(16).unwrap();
    assert_eq!(facts.group_by, vec!["pets: pet type"]);
    assert_eq!(facts.operands(AggOp::Avg), &["pets: pet age".to_string()][..]);
}

#[test]
fn type_tags_assigned_at_ingestion() {
    let corpus = load();

    assert_eq!(
        corpus.column_kind("employee_hire_evaluation", "evaluation: bonus"),
        Some(ColumnKind::Quantitative)
    );
    assert_eq!(
        corpus.column_kind("employee_hire_evaluation", "shop: district"),
        Some(ColumnKind::Nominal)
    );
    assert_eq!(corpus.column_kind("pets_1", "evaluation: bonus"), None);
}

#[test]
fn missing_files_are_reported() {
    let paths = CorpusPaths {
        schema_path: PathBuf::from("/nonexistent/tables.json"),
        query_path: PathBuf::from("/nonexistent/train.json"),
    };

    let err = SchemaCorpus::load(&paths, &SqlParserExtractor::default()).unwrap_err();
    assert!(matches!(err, CorpusError::IoError(..)));
}

#[test]
fn malformed_query_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let query_path = dir.path().join("train.json");
    std::fs::write(&query_path, "{not json").unwrap();

    let paths = CorpusPaths {
        schema_path: fixture_paths().schema_path,
        query_path,
    };

    let err = SchemaCorpus::load(&paths, &SqlParserExtractor::default()).unwrap_err();
    assert!(matches!(err, CorpusError::ParseError(..)));
}
