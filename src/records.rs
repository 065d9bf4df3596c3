//! Row types for the two datasets, one type per pipeline stage.
//!
//! A raw row is deserialized into a `*Record`, gains parsed timestamps in a
//! `Timed*` row, becomes a `Valid*` row once it survives range checks, and is
//! finally turned into the engineered [`Trip`] / [`GpsPoint`] written to disk.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The two dataset kinds handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Trips,
    GpsPoints,
}

impl DatasetKind {
    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Trips => "trips",
            DatasetKind::GpsPoints => "gps_points",
        }
    }

    /// Heading used in report sections.
    pub fn title(&self) -> &'static str {
        match self {
            DatasetKind::Trips => "Trips",
            DatasetKind::GpsPoints => "GPS points",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses a numeric cell, treating blanks and junk as missing.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

/// One trip row as found in a `routes_*.csv` file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "route_code")]
    pub trip_id: String,
    #[serde(rename = "cyclenumber", default)]
    pub bike_id: String,
    #[serde(rename = "startstationname", default)]
    pub start_station: String,
    #[serde(rename = "endstationname", default)]
    pub end_station: String,
    #[serde(rename = "unlockedat")]
    pub unlock_date_raw: String,
    #[serde(rename = "unlockedattime")]
    pub unlock_time_raw: String,
    #[serde(rename = "lockedat")]
    pub lock_date_raw: String,
    #[serde(rename = "lockedattime")]
    pub lock_time_raw: String,
    #[serde(rename = "length", default, deserialize_with = "lenient_f64")]
    pub distance_km: Option<f64>,
    #[serde(rename = "Membership", default)]
    pub membership_type: String,
    #[serde(rename = "costs", default, deserialize_with = "lenient_f64")]
    pub cost: Option<f64>,
    #[serde(rename = "rfidnumber", default)]
    pub payment_id: String,
    #[serde(rename = "CycleType", default)]
    pub bike_type: String,
    #[serde(default)]
    pub source_date: String,
}

/// One GPS sample as found in a `locations_*.csv` file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GpsRecord {
    #[serde(rename = "route_code")]
    pub trip_id: String,
    #[serde(rename = "cyclenumber", default)]
    pub bike_id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(rename = "coord_date")]
    pub coord_date_raw: String,
    #[serde(rename = "coord_time")]
    pub coord_time_raw: String,
    #[serde(default)]
    pub source_date: String,
}

/// Which combined date/time field failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Unlock,
    Lock,
    Recorded,
}

/// Validity tag carried from timestamp normalization to range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlag {
    InvalidTimestamp(TimestampField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedTrip {
    pub record: TripRecord,
    pub unlock_timestamp: Option<NaiveDateTime>,
    pub lock_timestamp: Option<NaiveDateTime>,
    pub flag: Option<RowFlag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedGpsPoint {
    pub record: GpsRecord,
    pub recorded_timestamp: Option<NaiveDateTime>,
    pub flag: Option<RowFlag>,
}

/// A trip that passed every range check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTrip {
    pub record: TripRecord,
    pub unlock_timestamp: NaiveDateTime,
    pub lock_timestamp: NaiveDateTime,
    pub duration_minutes: f64,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidGpsPoint {
    pub record: GpsRecord,
    pub recorded_timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BikeType {
    Regular,
    Pedelec,
    /// Any other value, kept verbatim after whitespace normalization.
    Other(String),
}

impl BikeType {
    pub fn parse(text: &str) -> Self {
        match text {
            t if t.eq_ignore_ascii_case("regular") => BikeType::Regular,
            t if t.eq_ignore_ascii_case("pedelec") => BikeType::Pedelec,
            t => BikeType::Other(t.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BikeType::Regular => "Regular",
            BikeType::Pedelec => "Pedelec",
            BikeType::Other(s) => s,
        }
    }
}

impl Serialize for BikeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimePeriod {
    Morning,
    Afternoon,
    Evening,
    Night,
}

/// A cleaned, feature-enriched trip. Field order is the column order of
/// the cleaned trips table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    pub trip_id: String,
    pub bike_id: String,
    pub start_station: String,
    pub end_station: String,
    pub unlock_date_raw: String,
    pub unlock_time_raw: String,
    pub lock_date_raw: String,
    pub lock_time_raw: String,
    pub distance_km: f64,
    pub membership_type: String,
    pub cost: Option<f64>,
    pub payment_id: String,
    pub bike_type: BikeType,
    pub source_date: String,

    pub unlock_timestamp: NaiveDateTime,
    pub lock_timestamp: NaiveDateTime,
    pub duration_minutes: f64,

    // engineered
    pub unlock_hour: u32,
    pub unlock_dayofweek: u32,
    pub unlock_date: NaiveDate,
    pub unlock_month: u32,
    pub unlock_day: u32,
    pub is_weekend: bool,
    pub time_period: TimePeriod,
}

/// A cleaned GPS sample. Field order is the column order of the cleaned
/// GPS table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsPoint {
    pub trip_id: String,
    pub bike_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub coord_date_raw: String,
    pub coord_time_raw: String,
    pub source_date: String,

    pub recorded_timestamp: NaiveDateTime,
    pub coord_hour: u32,
    pub coord_minute: u32,
    pub coord_second: u32,
}
