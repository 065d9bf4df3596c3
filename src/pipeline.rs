//! End-to-end orchestration of the preprocessing stages.

use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use crate::cleaning::{dedup, features, integrity, range, temporal};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::{self, RawTable};
use crate::records::{DatasetKind, GpsPoint, GpsRecord, Trip, TripRecord};
use crate::report::{QualityReport, QualityReporter};
use crate::schema;

/// Input files per dataset kind, in the order they are concatenated.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub trip_files: Vec<PathBuf>,
    pub gps_files: Vec<PathBuf>,
}

impl PipelineInputs {
    /// Finds `routes_*.csv` / `locations_*.csv` style files in `data_dir`.
    pub fn discover(data_dir: &Path, config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            trip_files: loader::discover_files(data_dir, &config.trip_file_prefix)?,
            gps_files: loader::discover_files(data_dir, &config.gps_file_prefix)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub trips: Vec<Trip>,
    pub gps_points: Vec<GpsPoint>,
    pub report: QualityReport,
}

/// Loads every input file and runs the full pipeline.
pub fn run(inputs: &PipelineInputs, config: &PipelineConfig) -> Result<PipelineOutput> {
    let trip_table = loader::load_raw_set(DatasetKind::Trips, &inputs.trip_files, config)?;
    let gps_table = loader::load_raw_set(DatasetKind::GpsPoints, &inputs.gps_files, config)?;
    run_tables(trip_table, gps_table, config)
}

/// Runs validation, cleaning, feature engineering and reporting over
/// already loaded tables.
pub fn run_tables(
    trip_table: RawTable,
    gps_table: RawTable,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    let mut reporter = QualityReporter::new(config);

    // Both schemas are checked before any row is touched.
    let trip_profile =
        schema::validate_schema(&trip_table, schema::input_columns(trip_table.kind))?;
    let gps_profile = schema::validate_schema(&gps_table, schema::input_columns(gps_table.kind))?;
    reporter.record_initial_duplicates(loader::duplicate_count(&trip_table, "route_code"));
    reporter.record_initial(trip_profile);
    reporter.record_initial(gps_profile);

    let trip_records: Vec<TripRecord> = trip_table.into_records()?;
    let gps_records: Vec<GpsRecord> = gps_table.into_records()?;

    let valid_trips = {
        let _span = info_span!("clean_trips").entered();
        let timed = temporal::normalize_trips(trip_records, config);
        let ranged = range::validate_trips(timed, config, &mut reporter.trips);
        dedup::deduplicate_trips(ranged, &mut reporter.trips)
    };

    let valid_points = {
        let _span = info_span!("clean_gps_points").entered();
        let timed = temporal::normalize_gps_points(gps_records, config);
        let ranged = range::validate_gps_points(timed, config, &mut reporter.gps_points);
        integrity::retain_referenced_points(ranged, &valid_trips, &mut reporter.gps_points)
    };

    let trips = features::engineer_trips(valid_trips, config);
    let gps_points = features::engineer_gps_points(valid_points);

    let report = reporter.finish(&trips, &gps_points);
    info!(
        trips_initial = report.trips.initial,
        trips_final = trips.len(),
        gps_initial = report.gps_points.initial,
        gps_final = gps_points.len(),
        "Pipeline complete"
    );

    Ok(PipelineOutput {
        trips,
        gps_points,
        report,
    })
}
