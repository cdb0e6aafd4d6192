//! Synthetic area tables.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use risk_map_area_models::{AreaTable, ZipCode};

use crate::IngestError;

/// First generated zip code.
const FIRST_SAMPLE_ZIP: usize = 10_000;

/// Most areas [`sample_areas`] can generate with distinct zip codes.
pub const MAX_SAMPLE_AREAS: usize = 100_000 - FIRST_SAMPLE_ZIP;

/// Generates `count` areas with uniformly random attributes.
///
/// Zip codes run upward from `10000`. The same seed always produces the
/// same table.
///
/// | column | range |
/// | --- | --- |
/// | `population` | integers in `[1000, 50000)` |
/// | `area_km2` | `[0.5, 10)` |
/// | `bird_density` | `[0, 100)` |
/// | `water_proximity`, `healthcare_capacity`, `vulnerability_index` | `[0, 1)` |
///
/// # Errors
///
/// Returns [`IngestError::TooManySamples`] if `count` exceeds
/// [`MAX_SAMPLE_AREAS`].
pub fn sample_areas(count: usize, seed: u64) -> Result<AreaTable, IngestError> {
    if count > MAX_SAMPLE_AREAS {
        return Err(IngestError::TooManySamples(count));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let zip_codes = (0..count)
        .map(|row| {
            ZipCode::parse(&(FIRST_SAMPLE_ZIP + row).to_string())
                .map_err(|source| IngestError::InvalidZipCode { row, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let population: Vec<f64> = (0..count)
        .map(|_| f64::from(rng.gen_range(1000_u32..50_000)))
        .collect();
    let mut uniform = |low: f64, high: f64| -> Vec<f64> {
        (0..count).map(|_| rng.gen_range(low..high)).collect()
    };

    let table = AreaTable::new(zip_codes)?
        .with_dense_column("population", &population)?
        .with_dense_column("area_km2", &uniform(0.5, 10.0))?
        .with_dense_column("bird_density", &uniform(0.0, 100.0))?
        .with_dense_column("water_proximity", &uniform(0.0, 1.0))?
        .with_dense_column("healthcare_capacity", &uniform(0.0, 1.0))?
        .with_dense_column("vulnerability_index", &uniform(0.0, 1.0))?;

    log::debug!("Generated {count} sample areas with seed {seed}");

    Ok(table)
}
