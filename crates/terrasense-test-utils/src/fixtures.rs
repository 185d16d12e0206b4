//! A small two-source world for pipeline tests.
//!
//! - `station_temp`: five geographic point records of `t2m`. Three at
//!   `t=0` (12, 15 and 9 degrees), two at `t=3600`, one of them missing.
//! - `era_t2m`: a 3 x 4 reanalysis grid in grid-index coordinates with
//!   slices at `t=0` and `t=21600`. Cell values are `10 + i` and `20 + i`
//!   for row-major index `i`; cell 5 of the first slice holds the
//!   `-999` sentinel.
//!
//! Both observe `t2m`, normalized with offset 10 and scale 5. The shared
//! frame spans latitude `[50, 56]` and longitude `[-6, 2]`.

use std::sync::Arc;

use smallvec::smallvec;
use terrasense_core::{
    CoordinateReference, Domain, GridAxes, GriddedArray, MissingValue, NormalizationParams,
    ObservationSource, PointRecord, Resolution, SourceData, SourceId, SourceRegistry,
    SourceSchema, TargetSet, Task, TimeQuery, Timestamp, TransformKind, VariableTransform,
};
use terrasense_space::{SpatialIndex, TimeAxis};

/// Shared immutable pipeline inputs.
#[derive(Clone, Debug)]
pub struct World {
    pub registry: Arc<SourceRegistry>,
    pub index: Arc<SpatialIndex>,
    pub params: Arc<NormalizationParams>,
    pub stations: SourceId,
    pub era: SourceId,
}

pub fn station_source() -> ObservationSource {
    let schema = SourceSchema {
        name: "station_temp".into(),
        variable: "t2m".into(),
        reference: CoordinateReference::Geographic,
        resolution: Resolution::Irregular,
        missing: MissingValue::Nan,
        domain: Domain::new_2d([50.0, -6.0], [56.0, 2.0]),
    };
    let records = vec![
        PointRecord::new([53.0, -2.0], Timestamp(0), 9.0),
        PointRecord::new([51.0, -1.0], Timestamp(0), 12.0),
        PointRecord::new([52.0, 0.0], Timestamp(0), 15.0),
        PointRecord::new([55.0, -3.0], Timestamp(3600), f64::NAN),
        PointRecord::new([54.0, 1.0], Timestamp(3600), 11.0),
    ];
    ObservationSource::new(schema, SourceData::Points(records)).expect("valid station fixture")
}

pub fn era_source() -> ObservationSource {
    let schema = SourceSchema {
        name: "era_t2m".into(),
        variable: "t2m".into(),
        reference: CoordinateReference::GridIndex {
            origin: [56.0, -6.0],
            spacing: [-1.0, 2.0],
        },
        resolution: Resolution::Grid { spacing: 1.0 },
        missing: MissingValue::Sentinel(-999.0),
        domain: Domain::new_2d([0.0, 0.0], [2.0, 3.0]),
    };
    let mut values: Vec<f64> = (0..12).map(|i| 10.0 + i as f64).collect();
    values[5] = -999.0;
    values.extend((0..12).map(|i| 20.0 + i as f64));
    let grid = GriddedArray {
        axes: GridAxes {
            axis0: vec![0.0, 1.0, 2.0],
            axis1: vec![0.0, 1.0, 2.0, 3.0],
        },
        times: vec![Timestamp(0), Timestamp(21_600)],
        values,
    };
    ObservationSource::new(schema, SourceData::Grid(grid)).expect("valid grid fixture")
}

pub fn t2m_transform() -> VariableTransform {
    VariableTransform::new(TransformKind::MeanStd, 5.0, 10.0).expect("valid transform")
}

pub fn station_world() -> World {
    let mut builder = SourceRegistry::builder();
    let stations = builder.register(station_source()).expect("register stations");
    let era = builder.register(era_source()).expect("register era");
    let registry = builder.build().expect("non-empty registry");

    let bounds = SpatialIndex::fit_bounds(&registry).expect("fit bounds");
    let params = NormalizationParams::builder(bounds.clone())
        .transform("t2m", t2m_transform())
        .build()
        .expect("build params");
    let index = SpatialIndex::new(&registry, bounds, TimeAxis::default()).expect("build index");

    World {
        registry: Arc::new(registry),
        index: Arc::new(index),
        params: Arc::new(params),
        stations,
        era,
    }
}

/// A context-free task with one `station_temp` target at the centre of
/// the frame, carrying `truth` as its normalized truth.
pub fn single_target_task(truth: f64) -> Task {
    let target = TargetSet::new(
        SourceId(0),
        "t2m",
        vec![smallvec![0.5, 0.5]],
        Some(vec![Some(truth)]),
    )
    .expect("valid target set");
    Task::new(TimeQuery::At(Timestamp(0)), vec![], vec![target]).expect("valid task")
}
