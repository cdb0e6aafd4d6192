#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zip code area table types.
//!
//! An [`AreaTable`] is the column-oriented input to risk scoring: one row
//! per [`ZipCode`], any number of named nullable numeric columns, and an
//! optional geometry per row. Tables are built once by an ingestion step
//! and treated as read-only afterwards.

pub use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// Number of digits in a normalized zip code.
pub const ZIP_CODE_WIDTH: usize = 5;

/// Default name of the zip code column in input files.
pub const ZIP_CODE_COLUMN: &str = "zip_code";

/// A five-digit, zero-padded zip code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Parses a zip code, left-padding short numeric codes with zeros
    /// (`"501"` becomes `"00501"`).
    ///
    /// A trailing `.0` is tolerated so that codes read back from floating
    /// point columns still parse.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, contains non-digit
    /// characters, or has more than five digits.
    pub fn parse(raw: &str) -> Result<Self, InvalidZipCodeError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);

        if digits.is_empty()
            || digits.len() > ZIP_CODE_WIDTH
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidZipCodeError {
                value: raw.to_owned(),
            });
        }

        Ok(Self(format!("{digits:0>width$}", width = ZIP_CODE_WIDTH)))
    }

    /// Returns the zip code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ZipCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ZipCode {
    type Err = InvalidZipCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = InvalidZipCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(value: ZipCode) -> Self {
        value.0
    }
}

/// Error returned when a value cannot be parsed as a [`ZipCode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidZipCodeError {
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidZipCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid zip code '{}': expected up to {ZIP_CODE_WIDTH} digits",
            self.value
        )
    }
}

impl std::error::Error for InvalidZipCodeError {}

/// A named numeric column with one nullable cell per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

impl Column {
    /// Column name as it appeared in the source file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell values in row order.
    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of null cells.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Errors raised while assembling an [`AreaTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// A zip code appears on more than one row.
    DuplicateZipCode(ZipCode),
    /// Two columns share a name.
    DuplicateColumn(String),
    /// A column or geometry list does not have one entry per row.
    LengthMismatch {
        /// Name of the offending column (`geometry` for geometries).
        column: String,
        /// Number of rows in the table.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateZipCode(zip) => write!(f, "duplicate zip code {zip}"),
            Self::DuplicateColumn(name) => write!(f, "duplicate column '{name}'"),
            Self::LengthMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column '{column}' has {actual} entries, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for TableError {}

/// Column-oriented table of areas keyed by zip code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaTable {
    zip_codes: Vec<ZipCode>,
    columns: Vec<Column>,
    geometries: Option<Vec<Option<MultiPolygon<f64>>>>,
}

impl AreaTable {
    /// Creates a table with one row per zip code and no columns.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateZipCode`] if a zip code repeats.
    pub fn new(zip_codes: Vec<ZipCode>) -> Result<Self, TableError> {
        let mut seen = std::collections::BTreeSet::new();
        for zip in &zip_codes {
            if !seen.insert(zip) {
                return Err(TableError::DuplicateZipCode(zip.clone()));
            }
        }

        Ok(Self {
            zip_codes,
            columns: Vec::new(),
            geometries: None,
        })
    }

    /// Appends a numeric column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column name is already used or the number of
    /// values differs from the number of rows.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, TableError> {
        let name = name.into();

        if self.column(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        if values.len() != self.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.len(),
                actual: values.len(),
            });
        }

        self.columns.push(Column { name, values });
        Ok(self)
    }

    /// Appends a column with no null cells.
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_column`].
    pub fn with_dense_column(
        self,
        name: impl Into<String>,
        values: &[f64],
    ) -> Result<Self, TableError> {
        self.with_column(name, values.iter().copied().map(Some).collect())
    }

    /// Attaches one optional geometry per row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::LengthMismatch`] if the count differs from the
    /// number of rows.
    pub fn with_geometries(
        mut self,
        geometries: Vec<Option<MultiPolygon<f64>>>,
    ) -> Result<Self, TableError> {
        if geometries.len() != self.len() {
            return Err(TableError::LengthMismatch {
                column: "geometry".to_owned(),
                expected: self.len(),
                actual: geometries.len(),
            });
        }

        self.geometries = Some(geometries);
        Ok(self)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zip_codes.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zip_codes.is_empty()
    }

    /// Zip codes in row order.
    #[must_use]
    pub fn zip_codes(&self) -> &[ZipCode] {
        &self.zip_codes
    }

    /// All numeric columns in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column's cells by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(Column::values)
    }

    /// Whether a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Whether the table carries a geometry list.
    #[must_use]
    pub const fn has_geometry(&self) -> bool {
        self.geometries.is_some()
    }

    /// Per-row geometries, if the table carries them.
    #[must_use]
    pub fn geometries(&self) -> Option<&[Option<MultiPolygon<f64>>]> {
        self.geometries.as_deref()
    }

    /// Geometry of a single row.
    #[must_use]
    pub fn geometry(&self, row: usize) -> Option<&MultiPolygon<f64>> {
        self.geometries.as_ref()?.get(row)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zips(codes: &[&str]) -> Vec<ZipCode> {
        codes.iter().map(|c| ZipCode::parse(c).unwrap()).collect()
    }

    #[test]
    fn pads_short_zip_codes() {
        assert_eq!(ZipCode::parse("501").unwrap().as_str(), "00501");
        assert_eq!(ZipCode::parse(" 10001 ").unwrap().as_str(), "10001");
    }

    #[test]
    fn accepts_float_formatted_zip_code() {
        assert_eq!(ZipCode::parse("10001.0").unwrap().as_str(), "10001");
    }

    #[test]
    fn rejects_invalid_zip_codes() {
        assert!(ZipCode::parse("").is_err());
        assert!(ZipCode::parse("123456").is_err());
        assert!(ZipCode::parse("10A01").is_err());
    }

    #[test]
    fn rejects_duplicate_zip_codes() {
        let err = AreaTable::new(zips(&["10001", "10001"])).unwrap_err();
        assert_eq!(
            err,
            TableError::DuplicateZipCode(ZipCode::parse("10001").unwrap())
        );
    }

    #[test]
    fn rejects_ragged_columns() {
        let table = AreaTable::new(zips(&["10001", "10002"])).unwrap();
        let err = table.with_dense_column("population", &[1.0]).unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let table = AreaTable::new(zips(&["10001"]))
            .unwrap()
            .with_dense_column("population", &[1.0])
            .unwrap();
        let err = table.with_dense_column("population", &[2.0]).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("population".to_owned()));
    }

    #[test]
    fn looks_up_columns_by_name() {
        let table = AreaTable::new(zips(&["10001", "10002"]))
            .unwrap()
            .with_column("bird_density", vec![Some(3.0), None])
            .unwrap();

        assert_eq!(table.column("bird_density"), Some(&[Some(3.0), None][..]));
        assert!(table.column("population").is_none());
        assert_eq!(table.columns()[0].null_count(), 1);
        assert!(!table.has_geometry());
        assert!(table.geometry(0).is_none());
    }
}
