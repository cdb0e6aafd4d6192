#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Writes scored zip code areas.
//!
//! Every output row carries the input columns followed by
//! `population_density`, one `*_norm` column per factor, `risk_score` and
//! `risk_category`. Each `*_norm` column holds the value that enters the
//! weighted sum, so protective factors are written inverted and
//! `risk_score` is the weighted sum of the `*_norm` columns. CSV output drops boundaries; `GeoJSON` output writes
//! one feature per area and needs a boundary for each of them.

use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson};
use risk_map_area_models::{AreaTable, ZIP_CODE_COLUMN};
use risk_map_risk::engine::ScoredRow;
use risk_map_risk::{Factor, RiskEngine, RiskError, ScoredTable};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum ExportFormat {
    /// Comma-separated values, without boundaries.
    #[strum(serialize = "csv")]
    Csv,
    /// A `GeoJSON` `FeatureCollection` with boundaries.
    #[strum(serialize = "geojson")]
    GeoJson,
}

impl ExportFormat {
    /// Parses a format name (`csv` or `geojson`).
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidArgument`] for any other name,
    /// including formats like `shp` that are not supported.
    pub fn parse_named(name: &str) -> Result<Self, RiskError> {
        name.trim().parse().map_err(|_| {
            RiskError::InvalidArgument(format!(
                "unsupported export format '{name}': expected 'csv' or 'geojson'"
            ))
        })
    }

    /// Guesses the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(Self::Csv),
            "geojson" | "json" => Some(Self::GeoJson),
            _ => None,
        }
    }
}

/// Errors that can occur while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The engine has nothing to export.
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// Writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a CSV record failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serializing `GeoJSON` failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` output was requested for areas without boundaries.
    #[error("GeoJSON export needs a boundary for every area; {missing} of {total} have none")]
    GeometryRequired {
        /// Areas without a boundary.
        missing: usize,
        /// Total areas.
        total: usize,
    },
}

/// Columns appended after the input columns, in output order.
#[must_use]
pub fn result_columns() -> Vec<&'static str> {
    let mut columns = vec!["population_density"];
    columns.extend(Factor::all().iter().map(|f| f.norm_column()));
    columns.extend(["risk_score", "risk_category"]);
    columns
}

/// Writes the engine's scored table to `path`.
///
/// # Errors
///
/// * [`RiskError::NotComputed`] (wrapped) if nothing has been scored.
/// * [`ExportError::GeometryRequired`] for `GeoJSON` output when any area
///   lacks a boundary. Nothing is written in that case.
/// * I/O and serialization errors.
pub fn export(engine: &RiskEngine, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
    let scored = engine.scored_table()?;
    if format == ExportFormat::GeoJson {
        require_geometry(&scored)?;
    }

    let file = BufWriter::new(std::fs::File::create(path)?);
    let count = match format {
        ExportFormat::Csv => write_csv(&scored, file)?,
        ExportFormat::GeoJson => write_geojson(&scored, file)?,
    };

    log::info!("Exported {count} scored areas as {format} to {}", path.display());
    Ok(())
}

fn require_geometry(scored: &ScoredTable<'_>) -> Result<(), ExportError> {
    if scored.has_complete_geometry() {
        return Ok(());
    }

    let total = scored.areas().len();
    let missing = scored
        .areas()
        .geometries()
        .map_or(total, |g| g.iter().filter(|g| g.is_none()).count());
    Err(ExportError::GeometryRequired { missing, total })
}

/// Input columns that do not clash with a result column.
fn passthrough_columns<'a>(scored: &ScoredTable<'a>) -> Vec<&'a str> {
    let reserved = result_columns();
    scored
        .input_columns()
        .filter(|name| {
            let clash = reserved.contains(name);
            if clash {
                log::warn!("Input column '{name}' is replaced by the computed column");
            }
            !clash
        })
        .collect()
}

fn result_values(row: &ScoredRow<'_>) -> impl Iterator<Item = f64> {
    let result = row.result;
    std::iter::once(result.population_density())
        .chain(Factor::all().iter().map(move |&f| result.factor(f).contribution))
        .chain(std::iter::once(result.risk_score))
}

/// Writes a scored table as CSV and returns the number of rows written.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv(scored: &ScoredTable<'_>, writer: impl Write) -> Result<usize, ExportError> {
    let inputs = passthrough_columns(scored);
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(
        std::iter::once(ZIP_CODE_COLUMN)
            .chain(inputs.iter().copied())
            .chain(result_columns()),
    )?;

    let mut count = 0;
    for row in scored.rows() {
        let mut record = vec![row.result.zip_code.to_string()];
        record.extend(
            row.attributes
                .iter()
                .filter(|(name, _)| inputs.contains(name))
                .map(|(_, value)| value.map(|v| v.to_string()).unwrap_or_default()),
        );
        record.extend(result_values(&row).map(|v| v.to_string()));
        record.push(row.result.risk_category.to_string());

        writer.write_record(&record)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

/// Writes a scored table as a `GeoJSON` `FeatureCollection` and returns the
/// number of features written.
///
/// # Errors
///
/// Returns [`ExportError::GeometryRequired`] if any area lacks a boundary,
/// or an error if writing fails.
pub fn write_geojson(
    scored: &ScoredTable<'_>,
    mut writer: impl Write,
) -> Result<usize, ExportError> {
    require_geometry(scored)?;

    let inputs = passthrough_columns(scored);
    let names = result_columns();

    let features: Vec<Feature> = scored
        .rows()
        .map(|row| {
            let mut properties = Map::new();
            properties.insert(
                ZIP_CODE_COLUMN.to_owned(),
                Value::String(row.result.zip_code.to_string()),
            );
            for (name, value) in &row.attributes {
                if inputs.contains(name) {
                    properties.insert((*name).to_owned(), value.map_or(Value::Null, Value::from));
                }
            }
            for (name, value) in names.iter().zip(result_values(&row)) {
                properties.insert((*name).to_owned(), Value::from(value));
            }
            properties.insert(
                "risk_category".to_owned(),
                Value::String(row.result.risk_category.to_string()),
            );

            Feature {
                bbox: None,
                geometry: row.geometry.map(risk_map_spatial::multipolygon_to_geometry),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let count = features.len();
    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });

    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;
    Ok(count)
}

/// Writes an unscored area table as CSV, e.g. generated sample data.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_area_csv(table: &AreaTable, writer: impl Write) -> Result<usize, ExportError> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(
        std::iter::once(ZIP_CODE_COLUMN).chain(table.columns().iter().map(|c| c.name())),
    )?;

    for (row, zip_code) in table.zip_codes().iter().enumerate() {
        let mut record = vec![zip_code.to_string()];
        record.extend(table.columns().iter().map(|c| {
            c.values()
                .get(row)
                .copied()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(table.len())
}

#[cfg(test)]
mod tests {
    use risk_map_risk::{FieldMapping, ZipCode};

    use super::*;

    fn boundary(lon: f64) -> Option<risk_map_area_models::MultiPolygon<f64>> {
        let east = lon + 0.01;
        risk_map_spatial::parse_geojson_to_multipolygon(&format!(
            r#"{{"type": "Polygon", "coordinates": [[[{lon}, 0.0], [{east}, 0.0], [{east}, 0.01], [{lon}, 0.01], [{lon}, 0.0]]]}}"#
        ))
    }

    fn areas() -> AreaTable {
        AreaTable::new(vec![
            ZipCode::parse("10001").unwrap(),
            ZipCode::parse("501").unwrap(),
        ])
        .unwrap()
        .with_dense_column("population", &[1000.0, 3000.0])
        .unwrap()
        .with_dense_column("area_km2", &[2.0, 1.0])
        .unwrap()
        .with_column("healthcare_capacity", vec![Some(1.0), None])
        .unwrap()
    }

    fn scored(areas: AreaTable) -> RiskEngine {
        let mut engine = RiskEngine::default().with_areas(areas);
        engine
            .calculate_risk_scores(&FieldMapping::default())
            .unwrap();
        engine
    }

    fn csv_rows(bytes: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_reader(bytes);
        let headers = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_owned)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_owned).collect())
            .collect();
        (headers, rows)
    }

    #[test]
    fn format_names() {
        assert_eq!(ExportFormat::parse_named("csv").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::parse_named("GeoJSON").unwrap(), ExportFormat::GeoJson);
        assert!(matches!(
            ExportFormat::parse_named("shp"),
            Err(RiskError::InvalidArgument(_))
        ));
        assert_eq!(ExportFormat::GeoJson.to_string(), "geojson");
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")), Some(ExportFormat::Csv));
        assert_eq!(
            ExportFormat::from_path(Path::new("out.geojson")),
            Some(ExportFormat::GeoJson)
        );
        assert_eq!(ExportFormat::from_path(Path::new("out.shp")), None);
        assert_eq!(ExportFormat::from_path(Path::new("out")), None);
    }

    #[test]
    fn csv_has_input_and_result_columns() {
        let engine = scored(areas());
        let mut buffer = Vec::new();
        let count = write_csv(&engine.scored_table().unwrap(), &mut buffer).unwrap();
        assert_eq!(count, 2);

        let (headers, rows) = csv_rows(&buffer);
        assert_eq!(
            headers,
            vec![
                "zip_code",
                "population",
                "area_km2",
                "healthcare_capacity",
                "population_density",
                "population_density_norm",
                "bird_density_norm",
                "water_proximity_norm",
                "healthcare_capacity_norm",
                "vulnerability_index_norm",
                "risk_score",
                "risk_category",
            ]
        );

        assert_eq!(rows[0][0], "10001");
        assert_eq!(rows[1][0], "00501");
        assert_eq!(rows[1][3], "");
        assert_eq!(rows[0][4].parse::<f64>().unwrap(), 500.0);
        assert_eq!(rows[1][4].parse::<f64>().unwrap(), 3000.0);
        assert_eq!(rows[0][11], "Low");
    }

    #[test]
    fn norm_columns_rebuild_risk_score() {
        let engine = scored(
            AreaTable::new(vec![
                ZipCode::parse("10001").unwrap(),
                ZipCode::parse("10002").unwrap(),
            ])
            .unwrap()
            .with_dense_column("population", &[1000.0, 1000.0])
            .unwrap()
            .with_dense_column("area_km2", &[1.0, 1.0])
            .unwrap()
            .with_dense_column("healthcare_capacity", &[1.0, 0.0])
            .unwrap(),
        );
        let mut buffer = Vec::new();
        write_csv(&engine.scored_table().unwrap(), &mut buffer).unwrap();

        let (headers, rows) = csv_rows(&buffer);
        let column = |row: &[String], name: &str| -> f64 {
            let index = headers.iter().position(|h| h == name).unwrap();
            row[index].parse().unwrap()
        };

        let healthcare = Factor::HealthcareCapacity.norm_column();
        assert!(column(&rows[0], healthcare).abs() < 1e-12);
        assert!((column(&rows[1], healthcare) - 1.0).abs() < 1e-12);

        let weights = engine.weights();
        for row in &rows {
            let rebuilt: f64 = Factor::all()
                .iter()
                .map(|&f| weights.get(f) * column(row, f.norm_column()))
                .sum();
            assert!((rebuilt - column(row, "risk_score")).abs() < 1e-9);
        }
        assert!(column(&rows[1], "risk_score") > column(&rows[0], "risk_score"));
    }

    #[test]
    fn computed_columns_replace_inputs() {
        let engine = scored(
            areas()
                .with_dense_column("risk_score", &[9.0, 9.0])
                .unwrap(),
        );
        let mut buffer = Vec::new();
        write_csv(&engine.scored_table().unwrap(), &mut buffer).unwrap();

        let (headers, rows) = csv_rows(&buffer);
        assert_eq!(headers.iter().filter(|h| *h == "risk_score").count(), 1);
        let score_index = headers.iter().position(|h| h == "risk_score").unwrap();
        assert!(rows[0][score_index].parse::<f64>().unwrap() <= 1.0);
    }

    #[test]
    fn geojson_writes_one_feature_per_area() {
        let engine = scored(
            areas()
                .with_geometries(vec![boundary(0.0), boundary(1.0)])
                .unwrap(),
        );
        let mut buffer = Vec::new();
        let count = write_geojson(&engine.scored_table().unwrap(), &mut buffer).unwrap();
        assert_eq!(count, 2);

        let parsed: GeoJson = String::from_utf8(buffer).unwrap().parse().unwrap();
        let GeoJson::FeatureCollection(collection) = parsed else {
            panic!("expected a FeatureCollection");
        };
        assert_eq!(collection.features.len(), 2);

        let properties = collection.features[1].properties.as_ref().unwrap();
        assert_eq!(properties["zip_code"], "00501");
        assert!(properties["healthcare_capacity"].is_null());
        assert_eq!(properties["risk_category"], "Medium");
        assert!(properties["risk_score"].is_number());
        assert!(collection.features[1].geometry.is_some());
    }

    #[test]
    fn geojson_requires_every_boundary() {
        let engine = scored(
            areas()
                .with_geometries(vec![boundary(0.0), None])
                .unwrap(),
        );
        let err = write_geojson(&engine.scored_table().unwrap(), Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::GeometryRequired {
                missing: 1,
                total: 2
            }
        ));

        let engine = scored(areas());
        let err = write_geojson(&engine.scored_table().unwrap(), Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::GeometryRequired {
                missing: 2,
                total: 2
            }
        ));
    }

    #[test]
    fn export_before_scoring_is_not_computed() {
        let engine = RiskEngine::default().with_areas(areas());
        let path = std::env::temp_dir().join("risk_map_unscored.csv");
        let err = export(&engine, &path, ExportFormat::Csv).unwrap_err();
        assert!(matches!(err, ExportError::Risk(RiskError::NotComputed)));
    }

    #[test]
    fn export_writes_file() {
        let engine = scored(areas());
        let path = std::env::temp_dir().join(format!("risk_map_export_{}.csv", std::process::id()));

        export(&engine, &path, ExportFormat::Csv).unwrap();
        let contents = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let (_, rows) = csv_rows(&contents);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn area_csv_round_trips_through_ingest_layout() {
        let mut buffer = Vec::new();
        assert_eq!(write_area_csv(&areas(), &mut buffer).unwrap(), 2);

        let (headers, rows) = csv_rows(&buffer);
        assert_eq!(
            headers,
            vec!["zip_code", "population", "area_km2", "healthcare_capacity"]
        );
        assert_eq!(rows[1], vec!["00501", "3000", "1", ""]);
    }
}
