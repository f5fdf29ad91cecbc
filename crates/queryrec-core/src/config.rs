//! Configuration schema (queryrec.toml)
//!
//! One immutable object, built at startup and handed to the engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::RecommendError;

/// SQL dialect of the reference corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// Generic ANSI-ish SQL
    Generic,

    /// SQLite (the Spider corpus dialect)
    Sqlite,

    /// PostgreSQL
    Postgres,

    /// MySQL
    Mysql,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Sqlite
    }
}

/// Similarity and decay parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum topic/database-name similarity for a database to be kept
    pub topic_sim: f32,

    /// Minimum column/SELECT-entity similarity for a cell to be on;
    /// also the base mining support
    pub item_sim: f32,

    /// Per-step relevance decay for history
    pub alpha: f32,

    /// Weight of database relevance against semantic similarity
    pub beta: f32,

    /// GROUP BY confidence and similarity threshold
    pub groupby: f32,

    /// Aggregate confidence and similarity threshold
    pub agg: f32,

    /// Similarity above which a matrix column joins a GROUP BY context hint
    pub context_sim: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            topic_sim: 0.4,
            item_sim: 0.4,
            alpha: 0.9,
            beta: 0.5,
            groupby: 0.4,
            agg: 0.4,
            context_sim: 0.7,
        }
    }
}

impl Thresholds {
    /// Reject parameters outside their valid ranges
    pub fn validate(&self) -> Result<(), RecommendError> {
        let unit = [
            ("topic_sim", self.topic_sim),
            ("item_sim", self.item_sim),
            ("groupby", self.groupby),
            ("agg", self.agg),
            ("context_sim", self.context_sim),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(RecommendError::configuration(format!(
                    "threshold '{}' must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(RecommendError::configuration(format!(
                "alpha must be within (0, 1], got {}",
                self.alpha
            )));
        }

        if !(self.beta >= 0.0) {
            return Err(RecommendError::configuration(format!(
                "beta must be non-negative, got {}",
                self.beta
            )));
        }

        Ok(())
    }

    /// Mining support after `steps` history steps: `item_sim * alpha^steps`
    pub fn decayed_support(&self, steps: usize) -> f32 {
        self.item_sim * self.alpha.powi(steps as i32)
    }
}

/// Per-call recommendation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendParams {
    /// Number of combos (initial) or ranked columns (refinement) to aim for
    pub top_n: usize,

    /// Mining support override for the initial call; defaults to `item_sim`
    pub min_support: Option<f32>,
}

impl Default for RecommendParams {
    fn default() -> Self {
        Self {
            top_n: 3,
            min_support: None,
        }
    }
}

impl RecommendParams {
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_min_support(mut self, support: f32) -> Self {
        self.min_support = Some(support);
        self
    }

    pub fn validate(&self) -> Result<(), RecommendError> {
        if self.top_n == 0 {
            return Err(RecommendError::configuration("top_n must be at least 1"));
        }
        if let Some(support) = self.min_support {
            if !(support > 0.0 && support <= 1.0) {
                return Err(RecommendError::configuration(format!(
                    "min_support must be within (0, 1], got {}",
                    support
                )));
            }
        }
        Ok(())
    }
}

/// Locations of the schema and reference query files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusPaths {
    /// Spider-format `tables.json`
    pub schema_path: PathBuf,

    /// Reference queries (`train_spider.json`)
    pub query_path: PathBuf,
}

impl Default for CorpusPaths {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from("data/dataset/spider/tables.json"),
            query_path: PathBuf::from("data/dataset/spider/train_spider.json"),
        }
    }
}

impl CorpusPaths {
    /// Resolve relative paths against `root`
    pub fn resolve(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_relative() { root.join(p) } else { p.clone() };
        Self {
            schema_path: join(&self.schema_path),
            query_path: join(&self.query_path),
        }
    }
}

/// Built-in hashed n-gram embedder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Vector width
    pub dimensions: usize,

    /// Character n-gram length
    pub ngram: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            ngram: 3,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// SQL dialect of the corpus
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Similarity and decay parameters
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Default per-call parameters
    #[serde(default)]
    pub recommend: RecommendParams,

    /// Corpus file locations
    #[serde(default)]
    pub corpus: CorpusPaths,

    /// Embedder settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            thresholds: Thresholds::default(),
            recommend: RecommendParams::default(),
            corpus: CorpusPaths::default(),
            embedding: EmbeddingConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl RecommenderConfig {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: RecommenderConfig = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Check every numeric parameter
    pub fn validate(&self) -> Result<(), RecommendError> {
        self.thresholds.validate()?;
        self.recommend.validate()?;
        if self.embedding.dimensions == 0 || self.embedding.ngram == 0 {
            return Err(RecommendError::configuration(
                "embedding dimensions and ngram must be positive",
            ));
        }
        Ok(())
    }

    /// Corpus paths resolved against the project root
    pub fn corpus_paths(&self) -> CorpusPaths {
        self.corpus.resolve(&self.project_root)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
