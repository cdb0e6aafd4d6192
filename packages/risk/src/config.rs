//! TOML scoring configuration.
//!
//! Every section is optional. A missing section takes its default; a
//! present `[weights]` table replaces the default weights entirely.

use std::path::Path;

use risk_map_risk_models::{FieldMapping, HighRiskQuery, NormalizationMethod, RiskWeights};
use serde::{Deserialize, Serialize};

use crate::RiskEngine;

/// The configuration this crate ships with.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML or has invalid values.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Scoring settings: method, weights, input columns and the default query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub normalization: NormalizationMethod,
    pub weights: RiskWeights,
    pub fields: FieldMapping,
    pub query: HighRiskQuery,
}

impl RiskConfig {
    /// An engine with this configuration's weights and normalization.
    #[must_use]
    pub fn engine(&self) -> RiskEngine {
        RiskEngine::new(self.weights.clone()).with_normalization(self.normalization)
    }
}

/// Parses a [`RiskConfig`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed, names an unknown factor or
/// normalization method, or has a negative weight.
pub fn parse_config_toml(toml_str: &str) -> Result<RiskConfig, ConfigError> {
    Ok(toml::de::from_str(toml_str)?)
}

/// Reads and parses a [`RiskConfig`] from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_config(path: &Path) -> Result<RiskConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config = parse_config_toml(&contents)?;
    log::info!("Loaded scoring config from {}", path.display());
    Ok(config)
}
