//! Aggregation settings.
//!
//! Defaults mirror the slideshow: top 10 students, top 3 per group and a
//! pass mark of 60 in every subject. Values can be overridden from a TOML
//! file.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    check_pass_threshold, DEFAULT_PASS_THRESHOLD, DEFAULT_TOP_K, DEFAULT_TOP_N,
};
use crate::error::{AggregateError, Result};
use crate::models::Metric;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Number of students in the overall ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Number of students kept per group in the performer tables.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum score required in each subject to pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    #[serde(default)]
    pub ranking_metric: Metric,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            top_k: default_top_k(),
            pass_threshold: default_pass_threshold(),
            ranking_metric: Metric::default(),
        }
    }
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

impl AggregationConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AggregationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(AggregateError::InvalidArgument(
                "top_n must be a positive integer".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(AggregateError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }
        check_pass_threshold(self.pass_threshold)
    }
}
