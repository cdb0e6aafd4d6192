//! CSV area tables.

use std::io::Read;
use std::path::Path;

use risk_map_area_models::{AreaTable, ZipCode};

use crate::{Cell, IngestError, IngestOptions, parse_cell};

/// Column name under which boundaries are usually exported as WKT.
const GEOMETRY_COLUMN: &str = "geometry";

/// Loads a CSV area table from `path`.
///
/// # Errors
///
/// See [`read_csv`].
pub fn load_csv(path: &Path, options: &IngestOptions) -> Result<AreaTable, IngestError> {
    let file = std::fs::File::open(path)?;
    read_csv(file, options)
}

/// Reads a CSV area table.
///
/// The zip code column is zero-padded to five digits. Every other column
/// becomes a nullable numeric column; cells that do not parse as numbers
/// are treated as null, and columns without a single number are dropped.
///
/// # Errors
///
/// Returns an error if the CSV is malformed (including rows whose length
/// differs from the header), the zip code column is missing, a zip code
/// is invalid, or a zip code appears twice.
pub fn read_csv(reader: impl Read, options: &IngestOptions) -> Result<AreaTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let zip_index = headers
        .iter()
        .position(|h| *h == options.zip_code_field)
        .ok_or_else(|| IngestError::MissingZipColumn(options.zip_code_field.clone()))?;

    let mut zip_codes = Vec::new();
    let mut columns: Vec<ColumnBuilder> = headers
        .iter()
        .map(|name| ColumnBuilder::new(name.clone()))
        .collect();

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let raw_zip = record.get(zip_index).unwrap_or("").trim();
        if raw_zip.is_empty() {
            return Err(IngestError::MissingZipCode {
                row,
                field: options.zip_code_field.clone(),
            });
        }
        let zip_code =
            ZipCode::parse(raw_zip).map_err(|source| IngestError::InvalidZipCode { row, source })?;
        zip_codes.push(zip_code);

        for (i, column) in columns.iter_mut().enumerate() {
            if i != zip_index {
                column.push(parse_cell(record.get(i).unwrap_or("")));
            }
        }
    }

    let mut table = AreaTable::new(zip_codes)?;

    for (i, column) in columns.into_iter().enumerate() {
        if i == zip_index {
            continue;
        }
        if column.name.eq_ignore_ascii_case(GEOMETRY_COLUMN) {
            log::warn!(
                "Ignoring CSV column '{}': boundaries are only read from GeoJSON input",
                column.name
            );
            continue;
        }
        if let Some((name, values)) = column.finish() {
            table = table.with_column(name, values)?;
        }
    }

    Ok(table)
}

struct ColumnBuilder {
    name: String,
    values: Vec<Option<f64>>,
    numbers: usize,
    text: usize,
}

impl ColumnBuilder {
    const fn new(name: String) -> Self {
        Self {
            name,
            values: Vec::new(),
            numbers: 0,
            text: 0,
        }
    }

    fn push(&mut self, cell: Cell) {
        self.values.push(match cell {
            Cell::Number(v) => {
                self.numbers += 1;
                Some(v)
            }
            Cell::Text => {
                self.text += 1;
                None
            }
            Cell::Null => None,
        });
    }

    fn finish(self) -> Option<(String, Vec<Option<f64>>)> {
        if self.numbers == 0 {
            log::debug!("Dropping non-numeric column '{}'", self.name);
            return None;
        }
        if self.text > 0 {
            log::warn!(
                "Column '{}' has {} non-numeric values; treating them as missing",
                self.name,
                self.text
            );
        }
        Some((self.name, self.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str) -> Result<AreaTable, IngestError> {
        read_csv(input.as_bytes(), &IngestOptions::default())
    }

    #[test]
    fn reads_numeric_columns() {
        let table = read(
            "zip_code,population,area_km2,bird_density\n\
             10001,21000,1.6,12.5\n\
             10002,80000,2.3,\n",
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column("population"), Some(&[Some(21000.0), Some(80000.0)][..]));
        assert_eq!(table.column("bird_density"), Some(&[Some(12.5), None][..]));
        assert!(!table.has_column("zip_code"));
    }

    #[test]
    fn pads_zip_codes() {
        let table = read("zip_code,population\n501,10\n2134.0,20\n").unwrap();
        let zips: Vec<&str> = table.zip_codes().iter().map(ZipCode::as_str).collect();
        assert_eq!(zips, vec!["00501", "02134"]);
    }

    #[test]
    fn drops_text_and_geometry_columns() {
        let table = read(
            "zip_code,borough,population,geometry\n\
             10001,Manhattan,100,\"POLYGON ((0 0, 1 0, 1 1, 0 0))\"\n",
        )
        .unwrap();

        let names: Vec<&str> = table.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["population"]);
        assert!(!table.has_geometry());
    }

    #[test]
    fn stray_text_cells_become_null() {
        let table = read("zip_code,population\n10001,100\n10002,unknown\n").unwrap();
        assert_eq!(table.column("population"), Some(&[Some(100.0), None][..]));
    }

    #[test]
    fn custom_zip_field() {
        let options = IngestOptions {
            zip_code_field: "ZCTA5CE10".to_owned(),
        };
        let table = read_csv("ZCTA5CE10,pop\n10001,5\n".as_bytes(), &options).unwrap();
        assert_eq!(table.zip_codes()[0].as_str(), "10001");
    }

    #[test]
    fn missing_zip_column() {
        let err = read("zip,population\n10001,5\n").unwrap_err();
        assert!(matches!(err, IngestError::MissingZipColumn(ref f) if f == "zip_code"));
    }

    #[test]
    fn empty_zip_code() {
        let err = read("zip_code,population\n,5\n").unwrap_err();
        assert!(matches!(err, IngestError::MissingZipCode { row: 0, .. }));
    }

    #[test]
    fn invalid_zip_code() {
        let err = read("zip_code,population\n10001,5\n1234567,6\n").unwrap_err();
        assert!(matches!(err, IngestError::InvalidZipCode { row: 1, .. }));
    }

    #[test]
    fn duplicate_zip_codes() {
        let err = read("zip_code,population\n10001,5\n10001,6\n").unwrap_err();
        assert!(matches!(err, IngestError::Table(_)));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = read("zip_code,population\n10001\n").unwrap_err();
        assert!(matches!(err, IngestError::Csv(_)));

        let err = read("zip_code,population\n10001,5,6\n").unwrap_err();
        assert!(matches!(err, IngestError::Csv(_)));
    }

    #[test]
    fn header_only_is_empty_table() {
        let table = read("zip_code,population\n").unwrap();
        assert!(table.is_empty());
        assert!(!table.has_column("population"));
    }
}
