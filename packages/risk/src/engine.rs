//! The stateful scoring engine.
//!
//! A [`RiskEngine`] owns one [`AreaTable`], the weights, and the result of
//! the most recent scoring pass. It moves between two states: `Idle` until
//! [`RiskEngine::calculate_risk_scores`] succeeds, then `Scored`. Every
//! successful pass replaces the cached result wholesale.

use geo::MultiPolygon;
use risk_map_area_models::{AreaTable, ZipCode};
use risk_map_risk_models::{
    Factor, FactorScore, FactorValue, FieldMapping, HighRiskQuery, NormalizationMethod,
    RiskCategory, RiskResult, RiskResultTable, RiskWeights,
};

use crate::RiskError;
use crate::normalize::normalize;
use crate::summary::DataCompleteness;

/// Derives an area in km² from a boundary when the table has no area
/// column.
pub trait AreaResolver: std::fmt::Debug + Send + Sync {
    /// Area of `boundary` in km², or `None` if it cannot be measured.
    fn area_km2(&self, boundary: &MultiPolygon<f64>) -> Option<f64>;
}

/// Measures WGS84 boundaries on the ellipsoid.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeodesicAreaResolver;

impl AreaResolver for GeodesicAreaResolver {
    fn area_km2(&self, boundary: &MultiPolygon<f64>) -> Option<f64> {
        risk_map_spatial::area_km2(boundary)
    }
}

#[derive(Debug, Clone)]
enum EngineState {
    Idle,
    Scored(RiskResultTable),
}

/// Composite risk scoring over a table of zip code areas.
#[derive(Debug)]
pub struct RiskEngine {
    areas: Option<AreaTable>,
    weights: RiskWeights,
    normalization: NormalizationMethod,
    area_resolver: Box<dyn AreaResolver>,
    state: EngineState,
}

impl RiskEngine {
    /// Creates an engine with no area table loaded.
    #[must_use]
    pub fn new(weights: RiskWeights) -> Self {
        Self {
            areas: None,
            weights,
            normalization: NormalizationMethod::default(),
            area_resolver: Box::new(GeodesicAreaResolver),
            state: EngineState::Idle,
        }
    }

    /// Loads the area table to score.
    #[must_use]
    pub fn with_areas(mut self, areas: AreaTable) -> Self {
        self.load_areas(areas);
        self
    }

    /// Sets the normalization strategy applied to every factor.
    #[must_use]
    pub fn with_normalization(mut self, method: NormalizationMethod) -> Self {
        self.normalization = method;
        self
    }

    /// Replaces the collaborator used to derive area from geometry.
    #[must_use]
    pub fn with_area_resolver(mut self, resolver: impl AreaResolver + 'static) -> Self {
        self.area_resolver = Box::new(resolver);
        self
    }

    /// Loads a new area table, discarding any cached result.
    pub fn load_areas(&mut self, areas: AreaTable) {
        log::info!("Loaded {} zip code areas", areas.len());
        self.areas = Some(areas);
        self.state = EngineState::Idle;
    }

    /// The loaded area table.
    #[must_use]
    pub const fn areas(&self) -> Option<&AreaTable> {
        self.areas.as_ref()
    }

    /// Effective (normalized) weights.
    #[must_use]
    pub const fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Normalization strategy in use.
    #[must_use]
    pub const fn normalization(&self) -> NormalizationMethod {
        self.normalization
    }

    /// Whether a scoring pass has succeeded since the table was loaded.
    #[must_use]
    pub const fn is_scored(&self) -> bool {
        matches!(self.state, EngineState::Scored(_))
    }

    /// Result of the last successful scoring pass.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::NotComputed`] if nothing has been scored.
    pub const fn results(&self) -> Result<&RiskResultTable, RiskError> {
        match &self.state {
            EngineState::Scored(results) => Ok(results),
            EngineState::Idle => Err(RiskError::NotComputed),
        }
    }

    /// Population per km² for every row.
    ///
    /// If `area_field` is not a column of the table, area is derived from
    /// each row's boundary. Null cells, zero or negative areas and
    /// non-finite quotients all yield 0.
    ///
    /// # Errors
    ///
    /// * [`RiskError::NotInitialized`] if no table is loaded.
    /// * [`RiskError::MissingData`] if the population column is missing, or
    ///   the area column is missing and the table has no geometry.
    pub fn calculate_population_density(
        &self,
        population_field: &str,
        area_field: &str,
    ) -> Result<Vec<f64>, RiskError> {
        let areas = self.areas.as_ref().ok_or(RiskError::NotInitialized)?;
        population_density(
            areas,
            population_field,
            area_field,
            self.area_resolver.as_ref(),
        )
    }

    /// Scores every area and caches the result.
    ///
    /// Optional factors whose column is not requested in `fields` or not
    /// present in the table contribute 0. Healthcare capacity is inverted
    /// after normalization so that more capacity means less risk.
    ///
    /// # Errors
    ///
    /// * [`RiskError::NotInitialized`] if no table is loaded.
    /// * [`RiskError::MissingData`] if population density cannot be
    ///   computed.
    ///
    /// On error the previously cached result is left untouched.
    pub fn calculate_risk_scores(
        &mut self,
        fields: &FieldMapping,
    ) -> Result<&RiskResultTable, RiskError> {
        let areas = self.areas.as_ref().ok_or(RiskError::NotInitialized)?;

        DataCompleteness::assess(areas, fields).log();

        let density = population_density(
            areas,
            &fields.population,
            &fields.area,
            self.area_resolver.as_ref(),
        )?;

        let results = score_areas(areas, fields, &density, &self.weights, self.normalization);

        let table = RiskResultTable::new(results);
        log::info!(
            "Scored {} areas with {} normalization",
            table.len(),
            self.normalization
        );
        for (category, count) in table.category_counts() {
            log::debug!("  {category}: {count}");
        }

        self.state = EngineState::Scored(table);
        self.results()
    }

    /// Highest-risk areas, sorted by score descending.
    ///
    /// With `query.top_n` set, the `top_n` highest scores of the whole table
    /// are returned and `query.threshold` is ignored. Otherwise every area
    /// scoring at least `query.threshold` is returned. Equal scores keep
    /// table order.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::NotComputed`] if nothing has been scored.
    pub fn get_high_risk_areas(&self, query: &HighRiskQuery) -> Result<Vec<&RiskResult>, RiskError> {
        let results = self.results()?;

        let mut ranked: Vec<&RiskResult> = results.iter().collect();
        ranked.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));

        match query.top_n {
            Some(n) => ranked.truncate(n),
            None => ranked.retain(|r| r.risk_score >= query.threshold),
        }

        Ok(ranked)
    }

    /// Input attributes joined with the cached result, for export.
    ///
    /// # Errors
    ///
    /// * [`RiskError::NotInitialized`] if no table is loaded.
    /// * [`RiskError::NotComputed`] if nothing has been scored.
    pub fn scored_table(&self) -> Result<ScoredTable<'_>, RiskError> {
        let areas = self.areas.as_ref().ok_or(RiskError::NotInitialized)?;
        let results = self.results()?;
        Ok(ScoredTable { areas, results })
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(RiskWeights::default())
    }
}

fn population_density(
    areas: &AreaTable,
    population_field: &str,
    area_field: &str,
    resolver: &dyn AreaResolver,
) -> Result<Vec<f64>, RiskError> {
    let population = areas
        .column(population_field)
        .ok_or_else(|| RiskError::MissingData {
            field: population_field.to_owned(),
            reason: "column not found in area table".to_owned(),
        })?;

    let area: Vec<Option<f64>> = if let Some(column) = areas.column(area_field) {
        column.to_vec()
    } else {
        let Some(boundaries) = areas.geometries() else {
            return Err(RiskError::MissingData {
                field: area_field.to_owned(),
                reason: "column not found and the table has no geometry to derive it from"
                    .to_owned(),
            });
        };

        log::info!(
            "Area column '{area_field}' not found; deriving area from {} boundaries",
            boundaries.len()
        );
        boundaries
            .iter()
            .map(|b| b.as_ref().and_then(|b| resolver.area_km2(b)))
            .collect()
    };

    Ok(population
        .iter()
        .zip(&area)
        .map(|(&pop, &area)| match (pop, area) {
            (Some(pop), Some(area)) if area > 0.0 => finite_or_zero(pop / area),
            _ => 0.0,
        })
        .collect())
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn score_areas(
    areas: &AreaTable,
    fields: &FieldMapping,
    density: &[f64],
    weights: &RiskWeights,
    method: NormalizationMethod,
) -> Vec<RiskResult> {
    let mut factors = vec![[FactorScore::ABSENT; Factor::COUNT]; areas.len()];

    fill_factor(&mut factors, Factor::PopulationDensity, density, method);

    for &factor in Factor::optional() {
        let Some(field) = fields.factor_field(factor) else {
            log::debug!("{factor} not requested; contributing 0");
            continue;
        };
        let Some(column) = areas.column(field) else {
            log::debug!("{factor} column '{field}' not present; contributing 0");
            continue;
        };

        let raw: Vec<f64> = column.iter().map(|v| v.unwrap_or(0.0)).collect();
        fill_factor(&mut factors, factor, &raw, method);
    }

    areas
        .zip_codes()
        .iter()
        .zip(factors)
        .enumerate()
        .map(|(row, (zip_code, factors))| score_row(row, zip_code, factors, weights))
        .collect()
}

fn fill_factor(
    rows: &mut [[FactorScore; Factor::COUNT]],
    factor: Factor,
    raw: &[f64],
    method: NormalizationMethod,
) {
    let normalized = normalize(raw, method);

    for ((scores, &raw), &normalized) in rows.iter_mut().zip(raw).zip(&normalized) {
        let contribution = if factor.is_protective() {
            1.0 - normalized
        } else {
            normalized
        };

        scores[factor.index()] = FactorScore {
            raw: FactorValue::Present(raw),
            normalized,
            contribution,
        };
    }
}

fn score_row(
    row: usize,
    zip_code: &ZipCode,
    factors: [FactorScore; Factor::COUNT],
    weights: &RiskWeights,
) -> RiskResult {
    let risk_score: f64 = Factor::all()
        .iter()
        .map(|&f| weights.get(f) * factors[f.index()].contribution)
        .sum();

    RiskResult {
        row,
        zip_code: zip_code.clone(),
        factors,
        risk_score,
        risk_category: RiskCategory::from_score(risk_score),
    }
}

/// One area's input attributes together with its score.
#[derive(Debug, Clone)]
pub struct ScoredRow<'a> {
    /// Input columns as `(name, value)` in table order.
    pub attributes: Vec<(&'a str, Option<f64>)>,
    /// Boundary passed through from the input, if any.
    pub geometry: Option<&'a MultiPolygon<f64>>,
    /// The area's score.
    pub result: &'a RiskResult,
}

/// An area table joined row-by-row with its scoring result.
#[derive(Debug, Clone, Copy)]
pub struct ScoredTable<'a> {
    areas: &'a AreaTable,
    results: &'a RiskResultTable,
}

impl<'a> ScoredTable<'a> {
    /// The input table.
    #[must_use]
    pub const fn areas(&self) -> &'a AreaTable {
        self.areas
    }

    /// The scoring result.
    #[must_use]
    pub const fn results(&self) -> &'a RiskResultTable {
        self.results
    }

    /// Names of the input columns, in table order.
    pub fn input_columns(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.areas.columns().iter().map(|c| c.name())
    }

    /// Whether every row carries a boundary.
    #[must_use]
    pub fn has_complete_geometry(&self) -> bool {
        self.areas
            .geometries()
            .is_some_and(|g| g.iter().all(Option::is_some))
    }

    /// Joined rows in table order.
    pub fn rows(&self) -> impl Iterator<Item = ScoredRow<'a>> + 'a {
        let areas = self.areas;
        self.results.iter().map(move |result| ScoredRow {
            attributes: areas
                .columns()
                .iter()
                .map(|c| (c.name(), c.values().get(result.row).copied().flatten()))
                .collect(),
            geometry: areas.geometry(result.row),
            result,
        })
    }
}
