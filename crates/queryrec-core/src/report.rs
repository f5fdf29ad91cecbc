//! Suggestion report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::suggestion::{ContextDict, SuggestionResult};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One recommendation call and the context it was made with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRound {
    /// Context supplied to the call
    pub context: ContextDict,

    /// What the engine suggested
    pub result: SuggestionResult,
}

/// Recommendation session report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Topic phrase the session started from
    pub topic: String,

    /// Reference databases that passed the topic threshold
    pub matched_databases: Vec<String>,

    /// Number of reference queries in the relevance matrix
    pub reference_rows: usize,

    /// Rounds in call order
    pub rounds: Vec<SuggestionRound>,
}

impl SuggestionReport {
    /// Create an empty report for a topic
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            topic: topic.into(),
            matched_databases: Vec::new(),
            reference_rows: 0,
            rounds: Vec::new(),
        }
    }

    /// Record one round
    pub fn add_round(&mut self, context: ContextDict, result: SuggestionResult) {
        self.rounds.push(SuggestionRound { context, result });
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = SuggestionReport::new("employee hire evaluation");
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert!(report.rounds.is_empty());
        assert_eq!(report.version.to_string(), "1.0");
    }

    #[test]
    fn report_serialization() {
        let mut report = SuggestionReport::new("pets");
        let mut result = SuggestionResult::default();
        result.push(vec!["pets: pet age".to_string()], vec![], Default::default());
        report.add_round(ContextDict::new(), result);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"rounds\""));
        assert!(json.contains("pets: pet age"));
    }
}
