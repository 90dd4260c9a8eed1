//! Text state configuration.
//!
//! Recognized keys (JSON, camelCase):
//!
//! ```json
//! {
//!   "mergeStrategy": "fuzzy",
//!   "similarityThreshold": 0.9,
//!   "kindAmbiguityTolerance": 0.1,
//!   "confidenceAggregation": "average"
//! }
//! ```
//!
//! Every key is optional; missing keys take their default.

use crate::confidence::Aggregation;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Fusion policy bound to a text state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategyKind {
    /// Merge across different but lexically similar words
    #[default]
    Fuzzy,
    /// Merge only on exact word identity
    Strict,
}

impl fmt::Display for MergeStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategyKind::Fuzzy => f.write_str("fuzzy"),
            MergeStrategyKind::Strict => f.write_str("strict"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config field `{field}` = {value} is outside [0, 1]")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration of one text state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextStateConfig {
    /// Which fusion policy to bind
    pub merge_strategy: MergeStrategyKind,
    /// Threshold of the default similarity predicate
    pub similarity_threshold: f64,
    /// Largest confidence gap still read as genuine NAME/TYPE ambiguity
    pub kind_ambiguity_tolerance: f64,
    /// Aggregation used for every confidence the state creates
    pub confidence_aggregation: Aggregation,
}

impl Default for TextStateConfig {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategyKind::default(),
            similarity_threshold: 0.9,
            kind_ambiguity_tolerance: 0.1,
            confidence_aggregation: Aggregation::default(),
        }
    }
}

impl TextStateConfig {
    pub fn strict() -> Self {
        Self {
            merge_strategy: MergeStrategyKind::Strict,
            ..Self::default()
        }
    }

    pub fn fuzzy() -> Self {
        Self::default()
    }

    /// Parse and validate
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json_str(&raw)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("similarityThreshold", self.similarity_threshold),
            ("kindAmbiguityTolerance", self.kind_ambiguity_tolerance),
        ] {
            if value.is_nan() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}
