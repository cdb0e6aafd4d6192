#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Boundary geometry helpers for zip code areas.
//!
//! Converts `GeoJSON` geometries into [`MultiPolygon`]s and measures their
//! area on the ellipsoid. Used by ingestion to keep boundaries for export
//! and by the scoring engine when an input table has no area column.

use geo::{ChamberlainDuquetteArea, MultiPolygon};
use geojson::GeoJson;

/// Square metres per square kilometre.
const SQ_M_PER_SQ_KM: f64 = 1_000_000.0;

/// Area of a WGS84 (longitude/latitude) boundary in km².
///
/// Returns `None` for empty geometries or when the computed area is not a
/// positive finite number.
#[must_use]
pub fn area_km2(boundary: &MultiPolygon<f64>) -> Option<f64> {
    if boundary.0.is_empty() {
        return None;
    }

    let area = boundary.chamberlain_duquette_unsigned_area() / SQ_M_PER_SQ_KM;
    if area.is_finite() && area > 0.0 {
        Some(area)
    } else {
        log::debug!("Discarding degenerate boundary area {area}");
        None
    }
}

/// Parse a `GeoJSON` string into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn parse_geojson_to_multipolygon(geojson_str: &str) -> Option<MultiPolygon<f64>> {
    let geojson: GeoJson = geojson_str.parse().ok()?;
    if let GeoJson::Geometry(geom) = geojson {
        geometry_to_multipolygon(geom)
    } else {
        None
    }
}

/// Convert a `GeoJSON` geometry into a [`MultiPolygon`].
///
/// Any geometry type other than `Polygon` or `MultiPolygon` yields `None`.
#[must_use]
pub fn geometry_to_multipolygon(geom: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Convert a [`MultiPolygon`] into a `GeoJSON` geometry for export.
#[must_use]
pub fn multipolygon_to_geometry(boundary: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(boundary))
}
