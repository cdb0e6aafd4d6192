#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk factor, weight, category and result types.
//!
//! These types describe the vocabulary of the avian-influenza risk model:
//! the five [`Factor`]s that feed the composite score, the [`RiskWeights`]
//! that combine them, the [`RiskCategory`] buckets a score falls into, and
//! the per-area [`RiskResult`] rows the scoring engine produces.

use std::collections::BTreeMap;

use risk_map_area_models::ZipCode;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default minimum score for [`HighRiskQuery`].
pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 0.7;

/// A named risk-contributing attribute.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Factor {
    /// Residents per km², derived from population and area.
    PopulationDensity,
    /// Poultry / wild bird density.
    BirdDensity,
    /// Proximity to water bodies (wild bird habitat).
    WaterProximity,
    /// Healthcare capacity. Protective: more capacity means less risk.
    HealthcareCapacity,
    /// Socioeconomic vulnerability index.
    VulnerabilityIndex,
}

impl Factor {
    /// Number of factors.
    pub const COUNT: usize = 5;

    /// Returns all variants of this enum, in scoring order.
    #[must_use]
    pub const fn all() -> &'static [Self; Self::COUNT] {
        &[
            Self::PopulationDensity,
            Self::BirdDensity,
            Self::WaterProximity,
            Self::HealthcareCapacity,
            Self::VulnerabilityIndex,
        ]
    }

    /// Factors read directly from an input column (everything except the
    /// derived population density).
    #[must_use]
    pub const fn optional() -> &'static [Self; 4] {
        &[
            Self::BirdDensity,
            Self::WaterProximity,
            Self::HealthcareCapacity,
            Self::VulnerabilityIndex,
        ]
    }

    /// Position of this factor in [`Self::all`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether a higher raw value lowers risk.
    #[must_use]
    pub const fn is_protective(self) -> bool {
        matches!(self, Self::HealthcareCapacity)
    }

    /// Weight used when no weights are configured.
    #[must_use]
    pub const fn default_weight(self) -> f64 {
        match self {
            Self::PopulationDensity => 0.3,
            Self::BirdDensity => 0.4,
            Self::WaterProximity => 0.15,
            Self::HealthcareCapacity => 0.1,
            Self::VulnerabilityIndex => 0.05,
        }
    }

    /// Name of the normalized output column (e.g. `bird_density_norm`).
    #[must_use]
    pub const fn norm_column(self) -> &'static str {
        match self {
            Self::PopulationDensity => "population_density_norm",
            Self::BirdDensity => "bird_density_norm",
            Self::WaterProximity => "water_proximity_norm",
            Self::HealthcareCapacity => "healthcare_capacity_norm",
            Self::VulnerabilityIndex => "vulnerability_index_norm",
        }
    }
}

/// A factor's raw value for one area.
///
/// `Absent` means the factor's column was missing or not requested, which
/// contributes nothing to the composite score. It is distinct from a
/// present value of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum FactorValue {
    /// The factor was available for this area.
    Present(f64),
    /// The factor was not available.
    Absent,
}

impl FactorValue {
    /// Whether a value is present.
    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// The value, if present.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Present(v) => Some(v),
            Self::Absent => None,
        }
    }
}

impl From<Option<f64>> for FactorValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl From<FactorValue> for Option<f64> {
    fn from(value: FactorValue) -> Self {
        value.value()
    }
}

/// Error returned when a weight configuration is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidWeightError {
    /// The factor name is not one of the five known factors.
    UnknownFactor(String),
    /// The weight is negative or not finite.
    InvalidValue {
        /// Factor the weight was given for.
        factor: Factor,
        /// The rejected weight.
        value: f64,
    },
}

impl std::fmt::Display for InvalidWeightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFactor(name) => write!(f, "unknown risk factor '{name}'"),
            Self::InvalidValue { factor, value } => write!(
                f,
                "invalid weight {value} for {factor}: expected a non-negative number"
            ),
        }
    }
}

impl std::error::Error for InvalidWeightError {}

/// Factor weights, normalized at construction to sum to 1.0.
///
/// A factor without an entry weighs 0, and an empty mapping falls back to
/// the defaults. If every given weight is 0 the weights are kept as given
/// and every composite score is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>"
)]
pub struct RiskWeights {
    weights: BTreeMap<Factor, f64>,
}

impl RiskWeights {
    /// Builds normalized weights from a factor mapping.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWeightError::InvalidValue`] for negative or
    /// non-finite weights.
    pub fn new(weights: BTreeMap<Factor, f64>) -> Result<Self, InvalidWeightError> {
        if weights.is_empty() {
            return Ok(Self::default());
        }

        for (&factor, &value) in &weights {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidWeightError::InvalidValue { factor, value });
            }
        }

        let total: f64 = weights.values().sum();
        let weights = if total > 0.0 {
            weights.into_iter().map(|(f, w)| (f, w / total)).collect()
        } else {
            weights
        };

        Ok(Self { weights })
    }

    /// Builds normalized weights from factor names (`snake_case`).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown factor names or invalid weights.
    pub fn from_named<'a>(
        weights: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, InvalidWeightError> {
        let mut map = BTreeMap::new();
        for (name, value) in weights {
            let factor: Factor = name
                .trim()
                .parse()
                .map_err(|_| InvalidWeightError::UnknownFactor(name.to_owned()))?;
            map.insert(factor, value);
        }
        Self::new(map)
    }

    /// Effective weight of a factor (0 when not configured).
    #[must_use]
    pub fn get(&self, factor: Factor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    /// Sum of the effective weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Iterates over configured factors and their effective weights.
    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.weights.iter().map(|(&f, &w)| (f, w))
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            weights: Factor::all()
                .iter()
                .map(|&f| (f, f.default_weight()))
                .collect(),
        }
    }
}

impl TryFrom<BTreeMap<String, f64>> for RiskWeights {
    type Error = InvalidWeightError;

    fn try_from(value: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::from_named(value.iter().map(|(k, &v)| (k.as_str(), v)))
    }
}

impl From<RiskWeights> for BTreeMap<String, f64> {
    fn from(value: RiskWeights) -> Self {
        value
            .weights
            .into_iter()
            .map(|(f, w)| (f.to_string(), w))
            .collect()
    }
}

/// Ordinal risk bucket for a composite score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RiskCategory {
    /// Score in `[0, 0.25]`.
    Low,
    /// Score in `(0.25, 0.5]`.
    Medium,
    /// Score in `(0.5, 0.75]`.
    High,
    /// Score in `(0.75, 1.0]`.
    #[serde(rename = "Very High")]
    #[strum(serialize = "Very High")]
    VeryHigh,
}

impl RiskCategory {
    /// Classifies a composite score.
    ///
    /// Each bucket includes its upper edge; `Low` also includes 0. Scores
    /// outside `[0, 1]` are clamped first, and NaN classifies as `Low`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };

        if score <= 0.25 {
            Self::Low
        } else if score <= 0.5 {
            Self::Medium
        } else if score <= 0.75 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    /// Returns all variants of this enum, lowest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::VeryHigh]
    }
}

/// Strategy used to rescale a raw column to `[0, 1]`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum NormalizationMethod {
    /// `(v - min) / (max - min)`; a constant column maps to 0.
    #[default]
    #[serde(rename = "min_max")]
    #[strum(serialize = "min_max")]
    MinMax,
    /// Logistic of the standard score; a zero-variance column maps to 0.5.
    #[serde(rename = "z_score")]
    #[strum(serialize = "z_score")]
    ZScore,
}

/// Input column names used by the scoring engine.
///
/// An optional factor set to `None` (or to an empty string in a config
/// file) is not requested and contributes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Population column.
    pub population: String,
    /// Area column in km².
    pub area: String,
    /// Bird density column.
    pub bird_density: Option<String>,
    /// Water proximity column.
    pub water_proximity: Option<String>,
    /// Healthcare capacity column.
    pub healthcare_capacity: Option<String>,
    /// Vulnerability index column.
    pub vulnerability_index: Option<String>,
}

impl FieldMapping {
    /// Column requested for an optional factor.
    ///
    /// Always `None` for [`Factor::PopulationDensity`], which is derived.
    #[must_use]
    pub fn factor_field(&self, factor: Factor) -> Option<&str> {
        let field = match factor {
            Factor::PopulationDensity => None,
            Factor::BirdDensity => self.bird_density.as_deref(),
            Factor::WaterProximity => self.water_proximity.as_deref(),
            Factor::HealthcareCapacity => self.healthcare_capacity.as_deref(),
            Factor::VulnerabilityIndex => self.vulnerability_index.as_deref(),
        };
        field.filter(|name| !name.trim().is_empty())
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            population: "population".to_owned(),
            area: "area_km2".to_owned(),
            bird_density: Some(Factor::BirdDensity.to_string()),
            water_proximity: Some(Factor::WaterProximity.to_string()),
            healthcare_capacity: Some(Factor::HealthcareCapacity.to_string()),
            vulnerability_index: Some(Factor::VulnerabilityIndex.to_string()),
        }
    }
}

/// One factor's values for one area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    /// Raw value (nulls in a present column are filled with 0).
    pub raw: FactorValue,
    /// Normalized value in `[0, 1]`, before any inversion.
    pub normalized: f64,
    /// Value entering the weighted sum. Equal to `normalized` except for
    /// protective factors, where it is `1 - normalized`. Always 0 when the
    /// factor is absent.
    pub contribution: f64,
}

impl FactorScore {
    /// Score for a factor that was not available.
    pub const ABSENT: Self = Self {
        raw: FactorValue::Absent,
        normalized: 0.0,
        contribution: 0.0,
    };
}

/// Scoring output for a single area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    /// Row of the area in the scored table.
    pub row: usize,
    /// Area identifier.
    pub zip_code: ZipCode,
    /// Per-factor values, indexed by [`Factor::index`].
    pub factors: [FactorScore; Factor::COUNT],
    /// Weighted composite score.
    pub risk_score: f64,
    /// Bucket of `risk_score`.
    pub risk_category: RiskCategory,
}

impl RiskResult {
    /// Values of a single factor.
    #[must_use]
    pub const fn factor(&self, factor: Factor) -> &FactorScore {
        &self.factors[factor.index()]
    }

    /// Residents per km² (0 when it could not be computed).
    #[must_use]
    pub fn population_density(&self) -> f64 {
        self.factor(Factor::PopulationDensity)
            .raw
            .value()
            .unwrap_or(0.0)
    }
}

/// All results of one scoring pass, in table row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskResultTable {
    results: Vec<RiskResult>,
}

impl RiskResultTable {
    /// Wraps results that are already in row order.
    #[must_use]
    pub const fn new(results: Vec<RiskResult>) -> Self {
        Self { results }
    }

    /// Number of scored areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing was scored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results in row order.
    #[must_use]
    pub fn results(&self) -> &[RiskResult] {
        &self.results
    }

    /// Iterates over results in row order.
    pub fn iter(&self) -> std::slice::Iter<'_, RiskResult> {
        self.results.iter()
    }

    /// Result for a zip code.
    #[must_use]
    pub fn get(&self, zip_code: &ZipCode) -> Option<&RiskResult> {
        self.results.iter().find(|r| &r.zip_code == zip_code)
    }

    /// Number of areas per category, including empty categories.
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<RiskCategory, usize> {
        let mut counts: BTreeMap<RiskCategory, usize> =
            RiskCategory::all().iter().map(|&c| (c, 0)).collect();
        for result in &self.results {
            *counts.entry(result.risk_category).or_default() += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a RiskResultTable {
    type Item = &'a RiskResult;
    type IntoIter = std::slice::Iter<'a, RiskResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Parameters for selecting high-risk areas.
///
/// When `top_n` is set, `threshold` is ignored and the `top_n` highest
/// scores are returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighRiskQuery {
    /// Minimum score (inclusive).
    pub threshold: f64,
    /// Number of top-scoring areas to return.
    pub top_n: Option<usize>,
}

impl HighRiskQuery {
    /// Query for the `n` highest-scoring areas.
    #[must_use]
    pub const fn top(n: usize) -> Self {
        Self {
            threshold: DEFAULT_HIGH_RISK_THRESHOLD,
            top_n: Some(n),
        }
    }

    /// Query for every area scoring at least `threshold`.
    #[must_use]
    pub const fn above(threshold: f64) -> Self {
        Self {
            threshold,
            top_n: None,
        }
    }
}

impl Default for HighRiskQuery {
    fn default() -> Self {
        Self::above(DEFAULT_HIGH_RISK_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((RiskWeights::default().total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalizes_weights_on_construction() {
        let weights =
            RiskWeights::from_named([("population_density", 2.0), ("bird_density", 6.0)]).unwrap();

        assert!((weights.total() - 1.0).abs() < 1e-12);
        assert!((weights.get(Factor::PopulationDensity) - 0.25).abs() < 1e-12);
        assert!((weights.get(Factor::BirdDensity) - 0.75).abs() < 1e-12);
        assert!(weights.get(Factor::WaterProximity).abs() < f64::EPSILON);
    }

    #[test]
    fn keeps_all_zero_weights_unchanged() {
        let weights = RiskWeights::from_named([("bird_density", 0.0)]).unwrap();
        assert!(weights.total().abs() < f64::EPSILON);
    }

    #[test]
    fn empty_mapping_uses_defaults() {
        assert_eq!(RiskWeights::new(BTreeMap::new()).unwrap(), RiskWeights::default());
        assert_eq!(RiskWeights::from_named(std::iter::empty()).unwrap(), RiskWeights::default());
    }

    #[test]
    fn rejects_unknown_factor_names() {
        let err = RiskWeights::from_named([("crime_rate", 1.0)]).unwrap_err();
        assert_eq!(err, InvalidWeightError::UnknownFactor("crime_rate".to_owned()));
    }

    #[test]
    fn rejects_negative_weights() {
        let err = RiskWeights::from_named([("bird_density", -0.5)]).unwrap_err();
        assert!(matches!(
            err,
            InvalidWeightError::InvalidValue {
                factor: Factor::BirdDensity,
                ..
            }
        ));
    }

    #[test]
    fn factor_names_round_trip_through_strum() {
        for &factor in Factor::all() {
            let parsed: Factor = factor.as_ref().parse().unwrap();
            assert_eq!(parsed, factor);
        }
        assert_eq!(Factor::HealthcareCapacity.to_string(), "healthcare_capacity");
        assert_eq!(
            Factor::HealthcareCapacity.norm_column(),
            "healthcare_capacity_norm"
        );
    }

    #[test]
    fn only_healthcare_is_protective() {
        let protective: Vec<Factor> = Factor::all()
            .iter()
            .copied()
            .filter(|f| f.is_protective())
            .collect();
        assert_eq!(protective, vec![Factor::HealthcareCapacity]);
    }

    #[test]
    fn classifies_bucket_edges() {
        assert_eq!(RiskCategory::from_score(0.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(0.25), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(0.250_001), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(0.5), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(0.75), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(0.76), RiskCategory::VeryHigh);
        assert_eq!(RiskCategory::from_score(1.0), RiskCategory::VeryHigh);
    }

    #[test]
    fn clamps_out_of_range_scores() {
        assert_eq!(RiskCategory::from_score(-0.3), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(1.7), RiskCategory::VeryHigh);
        assert_eq!(RiskCategory::from_score(f64::NAN), RiskCategory::Low);
    }

    #[test]
    fn every_score_in_range_has_exactly_one_category() {
        for i in 0..=1000 {
            let score = f64::from(i) / 1000.0;
            let category = RiskCategory::from_score(score);
            let matching = [
                (0.0..=0.25).contains(&score),
                score > 0.25 && score <= 0.5,
                score > 0.5 && score <= 0.75,
                score > 0.75 && score <= 1.0,
            ];
            assert_eq!(matching.iter().filter(|&&m| m).count(), 1);
            assert!(matching[RiskCategory::all()
                .iter()
                .position(|&c| c == category)
                .unwrap()]);
        }
    }

    #[test]
    fn category_labels() {
        assert_eq!(RiskCategory::VeryHigh.to_string(), "Very High");
        assert_eq!("Very High".parse::<RiskCategory>().unwrap(), RiskCategory::VeryHigh);
    }

    #[test]
    fn parses_normalization_methods() {
        assert_eq!(
            "min_max".parse::<NormalizationMethod>().unwrap(),
            NormalizationMethod::MinMax
        );
        assert_eq!(
            "z_score".parse::<NormalizationMethod>().unwrap(),
            NormalizationMethod::ZScore
        );
        assert!("robust".parse::<NormalizationMethod>().is_err());
        assert_eq!(NormalizationMethod::default(), NormalizationMethod::MinMax);
    }

    #[test]
    fn empty_field_name_disables_factor() {
        let fields = FieldMapping {
            water_proximity: Some(String::new()),
            vulnerability_index: None,
            ..FieldMapping::default()
        };

        assert_eq!(fields.factor_field(Factor::BirdDensity), Some("bird_density"));
        assert_eq!(fields.factor_field(Factor::WaterProximity), None);
        assert_eq!(fields.factor_field(Factor::VulnerabilityIndex), None);
        assert_eq!(fields.factor_field(Factor::PopulationDensity), None);
    }

    #[test]
    fn factor_value_from_option() {
        assert_eq!(FactorValue::from(Some(2.0)), FactorValue::Present(2.0));
        assert_eq!(FactorValue::from(None), FactorValue::Absent);
        assert!(!FactorValue::Absent.is_present());
    }
}
