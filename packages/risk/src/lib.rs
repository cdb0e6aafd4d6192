#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Composite risk scoring for zip code areas.
//!
//! The [`engine::RiskEngine`] takes an [`AreaTable`] and a set of
//! [`RiskWeights`], derives population density, rescales every factor to
//! `[0, 1]` with the [`normalize`] strategies, combines them into a
//! weighted score and classifies each area. Ranking queries run over the
//! cached result of the last scoring pass.
//!
//! Missing optional factors, empty cells and degenerate divisions are
//! defaulted rather than raised; see [`summary::DataCompleteness`] for the
//! operator-facing report of what was missing.

pub mod config;
pub mod engine;
pub mod normalize;
pub mod summary;

pub use engine::{AreaResolver, GeodesicAreaResolver, RiskEngine, ScoredTable};
pub use normalize::{normalize, normalize_named, parse_method};
pub use risk_map_area_models::{AreaTable, ZipCode};
pub use risk_map_risk_models::{
    Factor, FactorScore, FactorValue, FieldMapping, HighRiskQuery, NormalizationMethod,
    RiskCategory, RiskResult, RiskResultTable, RiskWeights,
};

/// Errors returned by scoring operations.
///
/// None of these leave the engine in a modified state: a previously
/// computed result stays cached and queryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskError {
    /// Scoring was requested before an area table was loaded.
    #[error("No area table loaded; load zip code data before scoring")]
    NotInitialized,

    /// A query was made before any scoring pass succeeded.
    #[error("Risk scores not calculated; run a scoring pass first")]
    NotComputed,

    /// A required field could not be resolved from any source.
    #[error("Missing data for field '{field}': {reason}")]
    MissingData {
        /// Name of the unresolved field.
        field: String,
        /// Why no fallback applied.
        reason: String,
    },

    /// An argument was not one of the accepted values.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<risk_map_risk_models::InvalidWeightError> for RiskError {
    fn from(value: risk_map_risk_models::InvalidWeightError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}
