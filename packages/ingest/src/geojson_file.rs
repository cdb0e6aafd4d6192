//! `GeoJSON` area tables.

use std::collections::HashMap;
use std::path::Path;

use geojson::{Feature, GeoJson};
use risk_map_area_models::{AreaTable, ZipCode};
use serde_json::Value;

use crate::{Cell, IngestError, IngestOptions, parse_cell};

/// Loads a `GeoJSON` area table from `path`.
///
/// # Errors
///
/// See [`parse_geojson`].
pub fn load_geojson(path: &Path, options: &IngestOptions) -> Result<AreaTable, IngestError> {
    let contents = std::fs::read_to_string(path)?;
    parse_geojson(&contents, options)
}

/// Parses a `FeatureCollection` of zip code areas.
///
/// Each feature's zip code comes from the configured property, which may
/// be a string or a number. Numeric properties (and strings that parse as
/// numbers) become columns; a feature without a property gets a null in
/// that column. `Polygon` and `MultiPolygon` geometries are kept as the
/// area's boundary.
///
/// # Errors
///
/// Returns an error if the input is not a `FeatureCollection`, a feature
/// has no valid zip code, or a zip code appears twice.
pub fn parse_geojson(contents: &str, options: &IngestOptions) -> Result<AreaTable, IngestError> {
    let GeoJson::FeatureCollection(collection) = contents.parse::<GeoJson>()? else {
        return Err(IngestError::NotFeatureCollection);
    };

    let total = collection.features.len();
    let field = options.zip_code_field.as_str();

    let mut zip_codes = Vec::with_capacity(total);
    let mut geometries = Vec::with_capacity(total);
    let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    let mut column_index: HashMap<String, usize> = HashMap::new();
    let mut unusable_boundaries = 0usize;

    for (row, feature) in collection.features.into_iter().enumerate() {
        let Feature {
            geometry,
            properties,
            ..
        } = feature;
        let properties = properties.unwrap_or_default();

        let raw_zip = match properties.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(IngestError::MissingZipCode {
                    row,
                    field: field.to_owned(),
                });
            }
        };
        zip_codes.push(
            ZipCode::parse(&raw_zip)
                .map_err(|source| IngestError::InvalidZipCode { row, source })?,
        );

        let boundary = geometry.and_then(risk_map_spatial::geometry_to_multipolygon);
        if boundary.is_none() {
            unusable_boundaries += 1;
        }
        geometries.push(boundary);

        for (key, value) in &properties {
            if key == field {
                continue;
            }
            let Some(number) = numeric_property(value) else {
                continue;
            };

            let index = *column_index.entry(key.clone()).or_insert_with(|| {
                columns.push((key.clone(), vec![None; total]));
                columns.len() - 1
            });
            columns[index].1[row] = Some(number);
        }
    }

    if unusable_boundaries > 0 {
        log::warn!("{unusable_boundaries}/{total} features have no polygon boundary");
    }

    let mut table = AreaTable::new(zip_codes)?.with_geometries(geometries)?;
    for (name, values) in columns {
        table = table.with_column(name, values)?;
    }

    Ok(table)
}

fn numeric_property(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => match parse_cell(s) {
            Cell::Number(v) => Some(v),
            Cell::Null | Cell::Text => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<AreaTable, IngestError> {
        parse_geojson(input, &IngestOptions::default())
    }

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [0.01, 0.0], [0.01, 0.01], [0.0, 0.01], [0.0, 0.0]]]
                },
                "properties": {"zip_code": "10001", "population": 21000, "name": "Chelsea"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                "properties": {"zip_code": 501, "population": "4200", "bird_density": 3.5}
            }
        ]
    }"#;

    #[test]
    fn reads_properties_and_boundaries() {
        let table = parse(COLLECTION).unwrap();

        let zips: Vec<&str> = table.zip_codes().iter().map(ZipCode::as_str).collect();
        assert_eq!(zips, vec!["10001", "00501"]);
        assert_eq!(
            table.column("population"),
            Some(&[Some(21000.0), Some(4200.0)][..])
        );
        assert_eq!(table.column("bird_density"), Some(&[None, Some(3.5)][..]));
        assert!(!table.has_column("name"));

        assert!(table.has_geometry());
        assert!(table.geometry(0).is_some());
        assert!(table.geometry(1).is_none());
    }

    #[test]
    fn rejects_bare_geometry() {
        let err = parse(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#).unwrap_err();
        assert!(matches!(err, IngestError::NotFeatureCollection));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(parse("{not json"), Err(IngestError::GeoJson(_))));
    }

    #[test]
    fn requires_zip_property() {
        let err = parse(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": null, "properties": {"population": 1}}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::MissingZipCode { row: 0, .. }));
    }

    #[test]
    fn rejects_duplicate_zip_codes() {
        let err = parse(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": null, "properties": {"zip_code": "10001"}},
                {"type": "Feature", "geometry": null, "properties": {"zip_code": "10001"}}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Table(_)));
    }

    #[test]
    fn empty_collection() {
        let table = parse(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(table.is_empty());
    }
}
