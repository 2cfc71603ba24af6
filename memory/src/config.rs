// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Memory layer configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```yaml
//! embedding_dimension: 384
//! distance_metric: cosine
//! summary_levels: 3
//! monitor:
//!   interval: 60s
//!   bucket_size_threshold_bytes: 100000000
//!   provider_usage_threshold_percent: 80.0
//!   domain_growth_threshold_percent: 20.0
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::vector_index::DistanceMetric;
use crate::error::MemoryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Dimension of buckets created without an explicit one
    pub embedding_dimension: usize,
    pub distance_metric: DistanceMetric,
    /// Levels requested from the summarizer
    pub summary_levels: u32,
    pub default_domain: String,
    pub default_source: String,
    /// Results sampled per root bucket when scoring bucket relevance
    pub relevance_sample_size: usize,
    pub monitor: MonitorConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 384,
            distance_metric: DistanceMetric::Cosine,
            summary_levels: 3,
            default_domain: "default".to_string(),
            default_source: "user".to_string(),
            relevance_sample_size: 5,
            monitor: MonitorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Estimated bucket size above which a warning is raised (critical at 2x)
    pub bucket_size_threshold_bytes: u64,
    /// Provider usage above which a warning is raised (critical above 95%)
    pub provider_usage_threshold_percent: f64,
    /// Domain growth between samples above which an info alert is raised
    /// (warning at 2x)
    pub domain_growth_threshold_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            bucket_size_threshold_bytes: 100_000_000,
            provider_usage_threshold_percent: 80.0,
            domain_growth_threshold_percent: 20.0,
        }
    }
}

impl MemoryConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: MemoryConfig =
            serde_yaml::from_str(yaml).context("Failed to parse memory configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read memory configuration from {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> std::result::Result<(), MemoryError> {
        if self.embedding_dimension == 0 {
            return Err(MemoryError::InvalidConfig(
                "embedding_dimension must be greater than zero".to_string(),
            ));
        }
        if self.relevance_sample_size == 0 {
            return Err(MemoryError::InvalidConfig(
                "relevance_sample_size must be greater than zero".to_string(),
            ));
        }
        self.monitor.validate()
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> std::result::Result<(), MemoryError> {
        if self.interval.is_zero() {
            return Err(MemoryError::InvalidConfig(
                "monitor.interval must be greater than zero".to_string(),
            ));
        }
        if self.bucket_size_threshold_bytes == 0 {
            return Err(MemoryError::InvalidConfig(
                "monitor.bucket_size_threshold_bytes must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.provider_usage_threshold_percent) {
            return Err(MemoryError::InvalidConfig(format!(
                "monitor.provider_usage_threshold_percent must be within 0-100, got {}",
                self.provider_usage_threshold_percent
            )));
        }
        if self.domain_growth_threshold_percent <= 0.0 {
            return Err(MemoryError::InvalidConfig(
                "monitor.domain_growth_threshold_percent must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
