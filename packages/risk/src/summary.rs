//! Operator-facing reports: what input was missing, and how the scores
//! are distributed.

use std::collections::BTreeMap;
use std::fmt;

use risk_map_area_models::AreaTable;
use risk_map_risk_models::{Factor, FieldMapping, RiskCategory, RiskResultTable};

/// Presence of one configured input column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCompleteness {
    /// What the column is used for (`population`, `area`, or a factor name).
    pub role: String,
    /// Configured column name; `None` if the factor is disabled.
    pub column: Option<String>,
    /// Whether the column exists in the table.
    pub present: bool,
    /// Number of null cells in the column.
    pub null_count: usize,
}

/// Which configured columns an [`AreaTable`] provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCompleteness {
    /// Number of rows in the table.
    pub rows: usize,
    /// Whether the table has boundaries to derive area from.
    pub has_geometry: bool,
    /// One entry per configured input, population and area first.
    pub fields: Vec<FieldCompleteness>,
}

impl DataCompleteness {
    #[must_use]
    pub fn assess(areas: &AreaTable, fields: &FieldMapping) -> Self {
        let check = |role: &str, column: Option<&str>| {
            let values = column.and_then(|c| areas.column(c));
            FieldCompleteness {
                role: role.to_owned(),
                column: column.map(str::to_owned),
                present: values.is_some(),
                null_count: values.map_or(0, |v| v.iter().filter(|x| x.is_none()).count()),
            }
        };

        let mut entries = vec![
            check("population", Some(fields.population.as_str())),
            check("area", Some(fields.area.as_str())),
        ];
        entries.extend(
            Factor::optional()
                .iter()
                .map(|&f| check(f.as_ref(), fields.factor_field(f))),
        );

        Self {
            rows: areas.len(),
            has_geometry: areas.has_geometry(),
            fields: entries,
        }
    }

    /// Configured columns the table does not have.
    pub fn missing(&self) -> impl Iterator<Item = &FieldCompleteness> {
        self.fields
            .iter()
            .filter(|f| f.column.is_some() && !f.present)
    }

    /// Whether every configured column is present without nulls.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fields
            .iter()
            .filter(|f| f.column.is_some())
            .all(|f| f.present && f.null_count == 0)
    }

    /// Logs the report: warnings for missing columns and null cells.
    pub fn log(&self) {
        for field in &self.fields {
            let Some(column) = &field.column else {
                log::debug!("{} disabled", field.role);
                continue;
            };

            if !field.present {
                if field.role == "area" && self.has_geometry {
                    log::info!("Column '{column}' not found; area will be derived from geometry");
                } else {
                    log::warn!("Column '{column}' ({}) not found in input", field.role);
                }
            } else if field.null_count > 0 {
                log::warn!(
                    "Column '{column}' ({}) has {}/{} null values",
                    field.role,
                    field.null_count,
                    self.rows
                );
            }
        }
    }
}

/// Descriptive statistics of a scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 for a single area.
    pub std_dev: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
    /// Areas per category, including empty categories.
    pub categories: BTreeMap<RiskCategory, usize>,
}

impl ScoreSummary {
    /// Summarizes `results`, or `None` if there are no results.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(results: &RiskResultTable) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let mut scores: Vec<f64> = results.iter().map(|r| r.risk_score).collect();
        scores.sort_by(f64::total_cmp);

        let count = scores.len();
        let n = count as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std_dev = if count < 2 {
            0.0
        } else {
            (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };

        Some(Self {
            count,
            mean,
            std_dev,
            min: scores[0],
            p25: quantile(&scores, 0.25),
            median: quantile(&scores, 0.5),
            p75: quantile(&scores, 0.75),
            max: scores[count - 1],
            categories: results.category_counts(),
        })
    }
}

/// Linear interpolation between the two nearest ranks.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - position.floor();
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

impl fmt::Display for ScoreSummary {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "count   {}", self.count)?;
        writeln!(f, "mean    {:.4}", self.mean)?;
        writeln!(f, "std     {:.4}", self.std_dev)?;
        writeln!(f, "min     {:.4}", self.min)?;
        writeln!(f, "25%     {:.4}", self.p25)?;
        writeln!(f, "50%     {:.4}", self.median)?;
        writeln!(f, "75%     {:.4}", self.p75)?;
        writeln!(f, "max     {:.4}", self.max)?;
        writeln!(f)?;
        writeln!(f, "Risk category distribution:")?;
        for (category, count) in &self.categories {
            let share = *count as f64 / self.count as f64 * 100.0;
            writeln!(f, "  {:<10} {count:>6} ({share:.1}%)", category.as_ref())?;
        }
        Ok(())
    }
}
