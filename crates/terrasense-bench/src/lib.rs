//! Benchmark profiles for the terrasense toolkit.
//!
//! - [`dense_profile`]: a station network plus a reanalysis grid over a
//!   fixed frame, sized by the caller
//! - [`scatter_coords`]: deterministic pseudo-random locations inside
//!   the frame, for candidates and query points

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use smallvec::smallvec;
use terrasense_core::{
    Coord, CoordinateReference, Domain, GridAxes, GriddedArray, MissingValue,
    NormalizationParams, ObservationSource, PointRecord, Resolution, SourceData, SourceId,
    SourceRegistry, SourceSchema, Timestamp, TransformKind, VariableTransform,
};
use terrasense_space::{SpatialIndex, TimeAxis};

/// Latitude range of every profile.
pub const LAT: [f64; 2] = [40.0, 60.0];
/// Longitude range of every profile.
pub const LON: [f64; 2] = [-10.0, 10.0];

/// Shared pipeline inputs for a benchmark run.
#[derive(Clone, Debug)]
pub struct BenchProfile {
    /// Station and grid sources.
    pub registry: Arc<SourceRegistry>,
    /// Frame fitted to both sources.
    pub index: Arc<SpatialIndex>,
    /// `t2m` normalization.
    pub params: Arc<NormalizationParams>,
    /// The station source.
    pub stations: SourceId,
    /// The grid source.
    pub grid: SourceId,
}

/// `n` locations spread over the frame by a multiplicative hash of
/// `seed`. Same inputs, same locations.
pub fn scatter_coords(n: usize, seed: u64) -> Vec<Coord> {
    let unit = |i: u64, mul: u64| {
        let h = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(i.wrapping_mul(mul));
        (h >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n as u64)
        .map(|i| {
            smallvec![
                LAT[0] + (LAT[1] - LAT[0]) * unit(i, 1442695040888963407),
                LON[0] + (LON[1] - LON[0]) * unit(i, 2862933555777941757),
            ]
        })
        .collect()
}

/// A profile with `stations` point records at each of `steps` hourly
/// stamps and a `rows x cols` grid with the same stamps.
///
/// Values are a smooth function of position and time, so every
/// observation is finite.
pub fn dense_profile(stations: usize, rows: usize, cols: usize, steps: usize) -> BenchProfile {
    let times: Vec<Timestamp> = (0..steps as i64).map(|h| Timestamp(h * 3600)).collect();
    let field = |lat: f64, lon: f64, t: usize| 10.0 + 0.3 * (lat - 50.0) - 0.2 * lon + t as f64;

    let sites = scatter_coords(stations, 7);
    let records = times
        .iter()
        .enumerate()
        .flat_map(|(t, &time)| {
            sites
                .iter()
                .map(move |c| PointRecord::new([c[0], c[1]], time, field(c[0], c[1], t)))
        })
        .collect();
    let station_schema = SourceSchema {
        name: "bench_stations".into(),
        variable: "t2m".into(),
        reference: CoordinateReference::Geographic,
        resolution: Resolution::Irregular,
        missing: MissingValue::Nan,
        domain: Domain::new_2d([LAT[0], LON[0]], [LAT[1], LON[1]]),
    };

    let lat_step = (LAT[1] - LAT[0]) / (rows.max(2) - 1) as f64;
    let lon_step = (LON[1] - LON[0]) / (cols.max(2) - 1) as f64;
    let mut values = Vec::with_capacity(steps * rows * cols);
    for t in 0..steps {
        for r in 0..rows {
            for c in 0..cols {
                let lat = LAT[1] - r as f64 * lat_step;
                let lon = LON[0] + c as f64 * lon_step;
                values.push(field(lat, lon, t));
            }
        }
    }
    let grid = GriddedArray {
        axes: GridAxes {
            axis0: (0..rows).map(|r| r as f64).collect(),
            axis1: (0..cols).map(|c| c as f64).collect(),
        },
        times: times.clone(),
        values,
    };
    let grid_schema = SourceSchema {
        name: "bench_grid".into(),
        variable: "t2m".into(),
        reference: CoordinateReference::GridIndex {
            origin: [LAT[1], LON[0]],
            spacing: [-lat_step, lon_step],
        },
        resolution: Resolution::Grid { spacing: lat_step },
        missing: MissingValue::Nan,
        domain: Domain::new_2d([0.0, 0.0], [(rows - 1) as f64, (cols - 1) as f64]),
    };

    let mut builder = SourceRegistry::builder();
    let stations = builder
        .register(
            ObservationSource::new(station_schema, SourceData::Points(records))
                .expect("station profile is valid"),
        )
        .expect("register stations");
    let grid = builder
        .register(
            ObservationSource::new(grid_schema, SourceData::Grid(grid))
                .expect("grid profile is valid"),
        )
        .expect("register grid");
    let registry = builder.build().expect("non-empty registry");

    let bounds = SpatialIndex::fit_bounds(&registry).expect("fit bounds");
    let params = NormalizationParams::builder(bounds.clone())
        .transform(
            "t2m",
            VariableTransform::new(TransformKind::MeanStd, 5.0, 10.0).expect("valid transform"),
        )
        .build()
        .expect("build params");
    let index = SpatialIndex::new(&registry, bounds, TimeAxis::default()).expect("build index");

    BenchProfile {
        registry: Arc::new(registry),
        index: Arc::new(index),
        params: Arc::new(params),
        stations,
        grid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_is_deterministic_and_inside_frame() {
        let a = scatter_coords(200, 3);
        assert_eq!(a, scatter_coords(200, 3));
        assert_ne!(a, scatter_coords(200, 4));
        for c in &a {
            assert!((LAT[0]..=LAT[1]).contains(&c[0]));
            assert!((LON[0]..=LON[1]).contains(&c[1]));
        }
    }

    #[test]
    fn dense_profile_builds() {
        let p = dense_profile(50, 8, 10, 3);
        assert_eq!(p.registry.len(), 2);
        let sites = scatter_coords(5, 11);
        for c in &sites {
            p.index.normalize(p.stations, c).unwrap();
        }
    }
}
