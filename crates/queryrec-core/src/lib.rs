//! QueryRec Core
//!
//! Shared domain model for the query recommender: column labels and type
//! tags, the binary relevance matrix, mined combos, session context and
//! suggestion output, plus the error taxonomy and configuration.

pub mod error;
pub mod schema;
pub mod matrix;
pub mod suggestion;
pub mod report;
pub mod config;

pub use error::{RecommendError, Result};
pub use schema::{
    AggOp, ColumnKind, ColumnLabel, DatabaseSchema, SchemaColumn, TableSchema, is_wildcard,
};
pub use matrix::BinaryRelevanceMatrix;
pub use suggestion::{AggregateHints, ContextDict, FrequentCombo, QueryFacts, SuggestionResult};
pub use report::{SuggestionReport, SuggestionRound, ReportVersion};
pub use config::{
    ConfigError, CorpusPaths, DialectConfig, EmbeddingConfig, RecommendParams, RecommenderConfig,
    Thresholds,
};
