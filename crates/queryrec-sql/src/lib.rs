//! SQL parsing and fact extraction
//!
//! This crate handles:
//! - Parsing reference SQL using datafusion-sqlparser-rs
//! - Resolving table aliases against a reference database schema
//! - Extracting SELECT entities, GROUP BY entities and aggregate operands

pub mod parser;
pub mod facts;

pub use parser::{SqlParser, ParsedSql, ParseError};
pub use facts::{ExtractError, GroupByAst, SelectAst, SelectEntity, SqlFactExtractor, SqlParserExtractor};
