//! QueryRec engine - Recommendation logic
//!
//! This crate implements the recommendation pipeline:
//! - Text similarity over a pluggable embedding model
//! - Topic search producing the binary relevance matrix
//! - Maximal frequent combo mining
//! - History-aware column ranking
//! - GROUP BY / aggregate suggestions
//!
//! `QueryRecommender` ties them together behind `initial_recommendation`
//! and `next_recommendation`.

pub mod embedder;
pub mod similarity;
pub mod topic;
pub mod miner;
pub mod ranker;
pub mod options;
pub mod recommender;

pub use embedder::{HashedNgramEmbedder, TextEmbedder};
pub use similarity::{cosine, SimilarityEngine, SimilarityMatrix, TextItems};
pub use topic::{DatabaseMatch, TopicMatcher};
pub use miner::{column_support, sort_combos, ComboMiner};
pub use ranker::{decay_weights, ContextRanker, Narrowing, RankedColumn};
pub use options::{OptionContexts, OptionRecommender};
pub use recommender::{BuildError, QueryRecommender, Recommendation};
