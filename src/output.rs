//! Persistence of the cleaned tables, the quality report and the column
//! manifests.
//!
//! Nothing here runs until the whole pipeline has succeeded, so a failed run
//! never leaves cleaned files behind.

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::PipelineOutput;
use crate::records::{DatasetKind, GpsPoint, Trip};
use crate::report::QualityReport;
use crate::schema::output_manifest;

pub const TRIPS_FILE: &str = "routes_cleaned.csv";
pub const GPS_POINTS_FILE: &str = "locations_cleaned.csv";
pub const REPORT_FILE: &str = "data_quality_report.json";
pub const TRIP_COLUMNS_FILE: &str = "routes_columns.json";
pub const GPS_COLUMNS_FILE: &str = "locations_columns.json";

/// Directory inside the output directory that files are written to before
/// they are moved into place.
const STAGING_DIR: &str = ".staging";

/// Logs the quality report using Rust's debug pretty-print format.
pub fn print_pretty(report: &QualityReport) {
    debug!("{:#?}", report);
}

/// Logs the quality report as pretty-printed JSON.
pub fn print_json(report: &QualityReport) -> Result<()> {
    info!("{}", report_json(report)?);
    Ok(())
}

/// The quality report as pretty-printed JSON, for printing to stdout.
pub fn report_json(report: &QualityReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<W> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

/// Writes `rows` as a CSV table with a header row, gzip-compressed when
/// `gzip` is set (a `.gz` suffix is appended to `path`). Returns the path
/// actually written.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T], gzip: bool) -> Result<PathBuf> {
    if gzip {
        let mut gz_path = path.as_os_str().to_owned();
        gz_path.push(".gz");
        let gz_path = PathBuf::from(gz_path);

        let encoder = GzEncoder::new(File::create(&gz_path)?, Compression::default());
        write_rows(encoder, rows)?.finish()?;
        debug!(path = %gz_path.display(), rows = rows.len(), "Wrote compressed table");
        Ok(gz_path)
    } else {
        write_rows(File::create(path)?, rows)?;
        debug!(path = %path.display(), rows = rows.len(), "Wrote table");
        Ok(path.to_path_buf())
    }
}

/// Writes the cleaned trips table as `routes_cleaned.csv[.gz]` in `dir`.
pub fn write_trips(dir: &Path, trips: &[Trip], gzip: bool) -> Result<PathBuf> {
    write_table(&dir.join(TRIPS_FILE), trips, gzip)
}

/// Writes the cleaned GPS table as `locations_cleaned.csv[.gz]` in `dir`.
pub fn write_gps_points(dir: &Path, points: &[GpsPoint], gzip: bool) -> Result<PathBuf> {
    write_table(&dir.join(GPS_POINTS_FILE), points, gzip)
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, body)?;
    Ok(())
}

/// Runs `write` against an empty staging directory inside `output_dir`,
/// then moves every file it returns into `output_dir`. When `write` fails
/// the staging directory is removed and `output_dir` is left untouched.
pub fn commit_staged<F>(output_dir: &Path, write: F) -> Result<Vec<PathBuf>>
where
    F: FnOnce(&Path) -> Result<Vec<PathBuf>>,
{
    fs::create_dir_all(output_dir)?;
    let staging = output_dir.join(STAGING_DIR);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let staged = match write(&staging) {
        Ok(paths) => paths,
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "Could not remove staging directory");
            }
            return Err(e);
        }
    };

    let mut committed = Vec::with_capacity(staged.len());
    for path in staged {
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = output_dir.join(name);
        fs::rename(&path, &target)?;
        committed.push(target);
    }
    fs::remove_dir_all(&staging)?;
    Ok(committed)
}

fn write_all(dir: &Path, output: &PipelineOutput, gzip: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    written.push(write_trips(dir, &output.trips, gzip)?);
    written.push(write_gps_points(dir, &output.gps_points, gzip)?);

    for (file, value) in [
        (TRIP_COLUMNS_FILE, output_manifest(DatasetKind::Trips)),
        (GPS_COLUMNS_FILE, output_manifest(DatasetKind::GpsPoints)),
    ] {
        let path = dir.join(file);
        write_json(&path, &value)?;
        written.push(path);
    }

    let report_path = dir.join(REPORT_FILE);
    write_json(&report_path, &output.report)?;
    written.push(report_path);
    Ok(written)
}

/// Writes every output of a successful run into `output_dir`. Either all
/// files land or none do.
#[tracing::instrument(skip(output_dir, output), fields(output_dir = %output_dir.display()))]
pub fn write_outputs(output_dir: &Path, output: &PipelineOutput, gzip: bool) -> Result<Vec<PathBuf>> {
    let written = commit_staged(output_dir, |staging| write_all(staging, output, gzip))?;
    info!(files = written.len(), "Outputs written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::report::QualityReporter;
    use crate::schema::{GPS_OUTPUT_COLUMNS, TRIP_OUTPUT_COLUMNS};
    use crate::records::{BikeType, TimePeriod};
    use chrono::NaiveDate;
    use std::env;
    use std::io::Read;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn sample_trip() -> Trip {
        let unlock = NaiveDate::from_ymd_opt(2019, 7, 18)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Trip {
            trip_id: "T1".to_string(),
            bike_id: "B1".to_string(),
            start_station: "Raatuse".to_string(),
            end_station: "Kaubamaja".to_string(),
            unlock_date_raw: "2019-07-18".to_string(),
            unlock_time_raw: "08:00:00".to_string(),
            lock_date_raw: "2019-07-18".to_string(),
            lock_time_raw: "08:15:00".to_string(),
            distance_km: 2.5,
            membership_type: "Day".to_string(),
            cost: None,
            payment_id: "R1".to_string(),
            bike_type: BikeType::Pedelec,
            source_date: "2019-07".to_string(),
            unlock_timestamp: unlock,
            lock_timestamp: unlock + chrono::Duration::minutes(15),
            duration_minutes: 15.0,
            unlock_hour: 8,
            unlock_dayofweek: 3,
            unlock_date: unlock.date(),
            unlock_month: 7,
            unlock_day: 18,
            is_weekend: false,
            time_period: TimePeriod::Morning,
        }
    }

    fn sample_point() -> GpsPoint {
        let ts = NaiveDate::from_ymd_opt(2019, 7, 18)
            .unwrap()
            .and_hms_opt(8, 1, 2)
            .unwrap();
        GpsPoint {
            trip_id: "T1".to_string(),
            bike_id: "B1".to_string(),
            latitude: 58.38,
            longitude: 26.72,
            coord_date_raw: "2019-07-18".to_string(),
            coord_time_raw: "08:01:02".to_string(),
            source_date: "2019-07".to_string(),
            recorded_timestamp: ts,
            coord_hour: 8,
            coord_minute: 1,
            coord_second: 2,
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        let report = QualityReporter::new(&PipelineConfig::default()).finish(&[], &[]);
        print_pretty(&report);
        print_json(&report).unwrap();
    }

    #[test]
    fn test_report_json_is_parseable() {
        let report = QualityReporter::new(&PipelineConfig::default()).finish(&[], &[]);
        let json: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
        assert_eq!(json["trips"]["initial"], 0);
        assert_eq!(json["sections"][0]["title"], "Trips - initial state");
    }

    #[test]
    fn test_failed_write_leaves_no_partial_output() {
        let dir = temp_path("bikeshare_prep_test_staged_fail");
        let _ = fs::remove_dir_all(&dir);

        let result = commit_staged(&dir, |staging| {
            write_trips(staging, &[sample_trip()], false)?;
            Err(PipelineError::Io(std::io::Error::other("disk full")))
        });

        assert!(result.is_err());
        assert!(!dir.join(TRIPS_FILE).exists());
        assert!(!dir.join(STAGING_DIR).exists());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_outputs_moves_every_file_into_place() {
        let dir = temp_path("bikeshare_prep_test_staged_ok");
        let _ = fs::remove_dir_all(&dir);
        let output = PipelineOutput {
            trips: vec![sample_trip()],
            gps_points: vec![sample_point()],
            report: QualityReporter::new(&PipelineConfig::default()).finish(&[], &[]),
        };

        let written = write_outputs(&dir, &output, false).unwrap();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.parent() == Some(dir.as_path()) && p.exists()));
        assert!(!dir.join(STAGING_DIR).exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_trip_header_matches_manifest() {
        let path = temp_path("bikeshare_prep_test_trips.csv");
        write_table(&path, &[sample_trip()], false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        let expected: Vec<&str> = TRIP_OUTPUT_COLUMNS.iter().map(|(n, _)| *n).collect();
        assert_eq!(header, expected);

        let row = lines.next().unwrap();
        assert!(row.contains("2019-07-18T08:00:00"));
        assert!(row.ends_with(",false,Morning"));
        assert!(row.contains(",Pedelec,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_gps_header_matches_manifest() {
        let path = temp_path("bikeshare_prep_test_points.csv");
        write_table(&path, &[sample_point()], false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header: Vec<&str> = content.lines().next().unwrap().split(',').collect();
        let expected: Vec<&str> = GPS_OUTPUT_COLUMNS.iter().map(|(n, _)| *n).collect();
        assert_eq!(header, expected);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_gzip_table_round_trips_through_decoder() {
        let dir = temp_path("bikeshare_prep_test_gz");
        fs::create_dir_all(&dir).unwrap();
        let written = write_gps_points(&dir, &[sample_point()], true).unwrap();
        assert_eq!(written, dir.join("locations_cleaned.csv.gz"));

        let mut decoder = flate2::read::GzDecoder::new(File::open(&written).unwrap());
        let mut content = String::new();
        decoder.read_to_string(&mut content).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("trip_id,bike_id,latitude"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
