//! Timestamp reconstruction from split date/time text fields.
//!
//! Rows whose timestamp does not parse are tagged, not dropped; the range
//! validator removes them so each removal is attributed to the right field.

use chrono::NaiveDateTime;
use tracing::info;

use crate::config::PipelineConfig;
use crate::records::{GpsRecord, RowFlag, TimedGpsPoint, TimedTrip, TimestampField, TripRecord};

/// Joins `date` and `time` with a space and parses them with `format`.
pub fn combine_timestamp(date: &str, time: &str, format: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() || time.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), format).ok()
}

pub fn normalize_trip(record: TripRecord, format: &str) -> TimedTrip {
    let unlock_timestamp = combine_timestamp(&record.unlock_date_raw, &record.unlock_time_raw, format);
    let lock_timestamp = combine_timestamp(&record.lock_date_raw, &record.lock_time_raw, format);

    let flag = if unlock_timestamp.is_none() {
        Some(RowFlag::InvalidTimestamp(TimestampField::Unlock))
    } else if lock_timestamp.is_none() {
        Some(RowFlag::InvalidTimestamp(TimestampField::Lock))
    } else {
        None
    };

    TimedTrip {
        record,
        unlock_timestamp,
        lock_timestamp,
        flag,
    }
}

pub fn normalize_gps_point(record: GpsRecord, format: &str) -> TimedGpsPoint {
    let recorded_timestamp =
        combine_timestamp(&record.coord_date_raw, &record.coord_time_raw, format);
    let flag = recorded_timestamp
        .is_none()
        .then_some(RowFlag::InvalidTimestamp(TimestampField::Recorded));

    TimedGpsPoint {
        record,
        recorded_timestamp,
        flag,
    }
}

#[tracing::instrument(skip_all, fields(rows = records.len()))]
pub fn normalize_trips(records: Vec<TripRecord>, config: &PipelineConfig) -> Vec<TimedTrip> {
    let rows: Vec<TimedTrip> = records
        .into_iter()
        .map(|r| normalize_trip(r, &config.timestamp_format))
        .collect();

    let flagged = rows.iter().filter(|r| r.flag.is_some()).count();
    info!(flagged, "Trip timestamps normalized");
    rows
}

#[tracing::instrument(skip_all, fields(rows = records.len()))]
pub fn normalize_gps_points(records: Vec<GpsRecord>, config: &PipelineConfig) -> Vec<TimedGpsPoint> {
    let rows: Vec<TimedGpsPoint> = records
        .into_iter()
        .map(|r| normalize_gps_point(r, &config.timestamp_format))
        .collect();

    let flagged = rows.iter().filter(|r| r.flag.is_some()).count();
    info!(flagged, "GPS timestamps normalized");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    fn record(unlock_time: &str, lock_date: &str) -> TripRecord {
        TripRecord {
            trip_id: "T1".to_string(),
            unlock_date_raw: "2019-07-18".to_string(),
            unlock_time_raw: unlock_time.to_string(),
            lock_date_raw: lock_date.to_string(),
            lock_time_raw: "08:15:00".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_combine_timestamp_trims_parts() {
        let ts = combine_timestamp(" 2019-07-18", "08:00:00 ", FORMAT).unwrap();
        let expected = NaiveDate::from_ymd_opt(2019, 7, 18)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_combine_timestamp_rejects_out_of_range_time() {
        assert!(combine_timestamp("2019-07-18", "25:99:00", FORMAT).is_none());
        assert!(combine_timestamp("2019-02-30", "08:00:00", FORMAT).is_none());
        assert!(combine_timestamp("", "08:00:00", FORMAT).is_none());
    }

    #[test]
    fn test_unlock_failure_is_flagged_first() {
        let timed = normalize_trip(record("25:99:00", "garbage"), FORMAT);
        assert_eq!(
            timed.flag,
            Some(RowFlag::InvalidTimestamp(TimestampField::Unlock))
        );
        assert!(timed.lock_timestamp.is_none());
    }

    #[test]
    fn test_lock_failure_is_flagged() {
        let timed = normalize_trip(record("08:00:00", ""), FORMAT);
        assert_eq!(timed.flag, Some(RowFlag::InvalidTimestamp(TimestampField::Lock)));
        assert!(timed.unlock_timestamp.is_some());
    }

    #[test]
    fn test_valid_trip_has_no_flag() {
        let timed = normalize_trip(record("08:00:00", "2019-07-18"), FORMAT);
        assert_eq!(timed.flag, None);
    }

    #[test]
    fn test_gps_point_flag() {
        let point = GpsRecord {
            trip_id: "T1".to_string(),
            coord_date_raw: "2019-07-18".to_string(),
            coord_time_raw: "nope".to_string(),
            ..Default::default()
        };
        let timed = normalize_gps_point(point, FORMAT);
        assert_eq!(
            timed.flag,
            Some(RowFlag::InvalidTimestamp(TimestampField::Recorded))
        );
    }
}
