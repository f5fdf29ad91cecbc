//! Error taxonomy shared by every recommendation component
//!
//! Errors are raised at the boundary of the component that detects them and
//! are never swallowed. An empty per-combo match is not an error; it degrades
//! to an empty suggestion instead.

use crate::config::ConfigError;

/// Errors produced by the recommendation engine
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    /// Similarity was requested over zero text items
    #[error("empty input: {0} has no items to compare")]
    EmptyInput(&'static str),

    /// The topic search produced no relevant databases or rows
    #[error("no reference database matches topic '{topic}'")]
    NoMatch { topic: String },

    /// Mining was requested on a matrix with zero rows
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A threshold or support parameter is out of range
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Loading the configuration file failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RecommendError {
    /// Shorthand for a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True if the caller could recover by broadening the topic
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
