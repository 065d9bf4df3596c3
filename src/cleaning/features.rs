//! Calendar and time-of-day features.
//!
//! Pure per-row mappings: nothing here drops a row or fails.

use chrono::{Datelike, Timelike};

use crate::config::{PipelineConfig, TimePeriodBounds};
use crate::records::{BikeType, GpsPoint, TimePeriod, Trip, ValidGpsPoint, ValidTrip};

/// Buckets an hour of day (0-23) into a [`TimePeriod`].
///
/// With the default bounds:
///
/// | Hours         | Period    |
/// |---------------|-----------|
/// | 05:00 - 11:59 | Morning   |
/// | 12:00 - 16:59 | Afternoon |
/// | 17:00 - 20:59 | Evening   |
/// | 21:00 - 04:59 | Night     |
pub fn time_period(hour: u32, bounds: &TimePeriodBounds) -> TimePeriod {
    match hour {
        h if h >= bounds.morning_start && h < bounds.afternoon_start => TimePeriod::Morning,
        h if h >= bounds.afternoon_start && h < bounds.evening_start => TimePeriod::Afternoon,
        h if h >= bounds.evening_start && h < bounds.night_start => TimePeriod::Evening,
        _ => TimePeriod::Night,
    }
}

/// Trims surrounding whitespace and collapses internal runs to one space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn engineer_trip(row: ValidTrip, bounds: &TimePeriodBounds) -> Trip {
    let unlock = row.unlock_timestamp;
    let r = row.record;

    let unlock_hour = unlock.hour();
    let unlock_dayofweek = unlock.weekday().num_days_from_monday();

    Trip {
        trip_id: r.trip_id,
        bike_id: r.bike_id,
        start_station: normalize_text(&r.start_station),
        end_station: normalize_text(&r.end_station),
        unlock_date_raw: r.unlock_date_raw,
        unlock_time_raw: r.unlock_time_raw,
        lock_date_raw: r.lock_date_raw,
        lock_time_raw: r.lock_time_raw,
        distance_km: row.distance_km,
        membership_type: normalize_text(&r.membership_type),
        cost: r.cost,
        payment_id: normalize_text(&r.payment_id),
        bike_type: BikeType::parse(&normalize_text(&r.bike_type)),
        source_date: r.source_date,
        unlock_timestamp: unlock,
        lock_timestamp: row.lock_timestamp,
        duration_minutes: row.duration_minutes,
        unlock_hour,
        unlock_dayofweek,
        unlock_date: unlock.date(),
        unlock_month: unlock.month(),
        unlock_day: unlock.day(),
        is_weekend: matches!(unlock_dayofweek, 5 | 6),
        time_period: time_period(unlock_hour, bounds),
    }
}

pub fn engineer_gps_point(row: ValidGpsPoint) -> GpsPoint {
    let ts = row.recorded_timestamp;
    let r = row.record;
    GpsPoint {
        trip_id: r.trip_id,
        bike_id: r.bike_id,
        latitude: row.latitude,
        longitude: row.longitude,
        coord_date_raw: r.coord_date_raw,
        coord_time_raw: r.coord_time_raw,
        source_date: r.source_date,
        recorded_timestamp: ts,
        coord_hour: ts.hour(),
        coord_minute: ts.minute(),
        coord_second: ts.second(),
    }
}

#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn engineer_trips(rows: Vec<ValidTrip>, config: &PipelineConfig) -> Vec<Trip> {
    rows.into_iter()
        .map(|row| engineer_trip(row, &config.time_periods))
        .collect()
}

#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn engineer_gps_points(rows: Vec<ValidGpsPoint>) -> Vec<GpsPoint> {
    rows.into_iter().map(engineer_gps_point).collect()
}
