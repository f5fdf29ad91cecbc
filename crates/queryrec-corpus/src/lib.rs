//! Reference corpus loading
//!
//! This crate handles:
//! - Parsing the Spider-format schema file (tables.json)
//! - Parsing the reference query file (train_spider.json)
//! - Decoding every reference query once, at load time
//! - Database name normalization for topic matching

pub mod spider;
pub mod corpus;

pub use spider::{SpiderDatabase, SpiderQuery};
pub use corpus::{CorpusError, ReferenceQuery, SchemaCorpus, normalize_db_name};
