//! Rescaling of raw factor columns to `[0, 1]`.
//!
//! Two strategies are available. Min-max keeps relative spacing and is
//! sensitive to outliers; z-score passes standard scores through the
//! logistic function, which compresses outliers and centres the typical
//! value near 0.5. Neither mutates its input.

use risk_map_risk_models::NormalizationMethod;

use crate::RiskError;

/// Rescales `values` to `[0, 1]` with the given method.
///
/// Non-finite inputs are left out of the statistics and map to 0, as does
/// any non-finite output.
#[must_use]
pub fn normalize(values: &[f64], method: NormalizationMethod) -> Vec<f64> {
    let normalized = match method {
        NormalizationMethod::MinMax => min_max(values),
        NormalizationMethod::ZScore => z_score(values),
    };

    normalized
        .into_iter()
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect()
}

/// Rescales `values` with a method given by name (`min_max` or `z_score`).
///
/// # Errors
///
/// Returns [`RiskError::InvalidArgument`] for any other method name.
pub fn normalize_named(values: &[f64], method: &str) -> Result<Vec<f64>, RiskError> {
    Ok(normalize(values, parse_method(method)?))
}

/// Parses a normalization method name (`min_max` or `z_score`).
///
/// # Errors
///
/// Returns [`RiskError::InvalidArgument`] for any other name.
pub fn parse_method(name: &str) -> Result<NormalizationMethod, RiskError> {
    name.trim().parse().map_err(|_| {
        RiskError::InvalidArgument(format!(
            "unknown normalization method '{name}': expected 'min_max' or 'z_score'"
        ))
    })
}

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| v.is_finite())
}

/// A constant column carries no signal and maps to 0.
fn min_max(values: &[f64]) -> Vec<f64> {
    let (min, max) = finite(values).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;

    if range.is_nan() || range <= 0.0 {
        return vec![0.0; values.len()];
    }

    values.iter().map(|&v| (v - min) / range).collect()
}

/// Uses the sample standard deviation. Fewer than two values, or zero
/// variance, maps everything to the neutral 0.5.
#[allow(clippy::cast_precision_loss)]
fn z_score(values: &[f64]) -> Vec<f64> {
    let n = finite(values).count();
    if n < 2 {
        return vec![0.5; values.len()];
    }

    let count = n as f64;
    let mean = finite(values).sum::<f64>() / count;
    let variance = finite(values).map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0);
    let std_dev = variance.sqrt();

    if std_dev.is_nan() || std_dev <= 0.0 {
        return vec![0.5; values.len()];
    }

    values
        .iter()
        .map(|&v| logistic((v - mean) / std_dev))
        .collect()
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
