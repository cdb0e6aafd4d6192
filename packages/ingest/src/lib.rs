#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads zip code area tables.
//!
//! Input is a CSV file of per-zip attributes or a `GeoJSON`
//! `FeatureCollection` of zip boundaries with numeric properties. Either
//! way the result is an [`AreaTable`] keyed by five-digit zip code, ready
//! for scoring. [`sample_areas`] generates a synthetic table for trying
//! the pipeline without real data.

use std::path::Path;

use risk_map_area_models::{AreaTable, InvalidZipCodeError, TableError, ZIP_CODE_COLUMN};

mod csv_file;
mod geojson_file;
mod sample;

pub use csv_file::{load_csv, read_csv};
pub use geojson_file::{load_geojson, parse_geojson};
pub use sample::{MAX_SAMPLE_AREAS, sample_areas};

/// Errors that can occur while loading an area table.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV input could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The `GeoJSON` input could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// The top-level `GeoJSON` object is not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// The zip code column is not in the CSV header.
    #[error("Zip code column '{0}' not found")]
    MissingZipColumn(String),

    /// A row has no zip code.
    #[error("Row {row} has no '{field}' value")]
    MissingZipCode {
        /// Zero-based data row.
        row: usize,
        /// Zip code field name.
        field: String,
    },

    /// A row's zip code is not a valid US zip code.
    #[error("Row {row}: {source}")]
    InvalidZipCode {
        /// Zero-based data row.
        row: usize,
        /// The validation failure.
        source: InvalidZipCodeError,
    },

    /// The rows do not form a valid table (e.g. duplicate zip codes).
    #[error("Invalid area table: {0}")]
    Table(#[from] TableError),

    /// The file extension is not a supported input format.
    #[error("Unsupported input format '{0}': expected .csv, .geojson or .json")]
    UnsupportedFormat(String),

    /// More sample areas were requested than there are zip codes.
    #[error("Cannot generate {0} sample areas: at most {max} are available", max = MAX_SAMPLE_AREAS)]
    TooManySamples(usize),
}

impl From<geojson::Error> for IngestError {
    fn from(value: geojson::Error) -> Self {
        Self::GeoJson(Box::new(value))
    }
}

/// Options shared by all input formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Column (CSV) or property (`GeoJSON`) holding the zip code.
    pub zip_code_field: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            zip_code_field: ZIP_CODE_COLUMN.to_owned(),
        }
    }
}

/// Loads an area table, choosing the parser by file extension.
///
/// `.csv` files are read as CSV; `.geojson` and `.json` as `GeoJSON`.
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedFormat`] for any other extension, or
/// the parser's error if the file cannot be read or is malformed.
pub fn load(path: &Path, options: &IngestOptions) -> Result<AreaTable, IngestError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => load_csv(path, options)?,
        "geojson" | "json" => load_geojson(path, options)?,
        _ => return Err(IngestError::UnsupportedFormat(extension)),
    };

    log::info!(
        "Loaded {} zip code areas ({} columns{}) from {}",
        table.len(),
        table.columns().len(),
        if table.has_geometry() {
            ", with boundaries"
        } else {
            ""
        },
        path.display()
    );

    Ok(table)
}

/// A parsed input cell.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
    Null,
    Number(f64),
    Text,
}

/// Tokens read as a missing value.
const NULL_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

fn parse_cell(raw: &str) -> Cell {
    let raw = raw.trim();
    if NULL_TOKENS.iter().any(|t| raw.eq_ignore_ascii_case(t)) {
        return Cell::Null;
    }

    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Number(v),
        Ok(_) => Cell::Null,
        Err(_) => Cell::Text,
    }
}
