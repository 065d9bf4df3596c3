//! Pipeline configuration.
//!
//! All bounds and formats used by the validators live in one immutable
//! [`PipelineConfig`] that is handed to each stage explicitly.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Inclusive latitude/longitude box covering the service area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lat: 58.0,
            max_lat: 59.0,
            min_lon: 26.0,
            max_lon: 27.5,
        }
    }
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// First hour (0-23) of each time period. Night runs from `night_start`
/// through midnight up to `morning_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimePeriodBounds {
    pub morning_start: u32,
    pub afternoon_start: u32,
    pub evening_start: u32,
    pub night_start: u32,
}

impl Default for TimePeriodBounds {
    fn default() -> Self {
        Self {
            morning_start: 5,
            afternoon_start: 12,
            evening_start: 17,
            night_start: 21,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// chrono format applied to `"<date> <time>"`.
    pub timestamp_format: String,
    pub delimiter: char,
    pub max_duration_minutes: f64,
    pub min_distance_km: f64,
    pub max_distance_km: f64,
    pub bounding_box: BoundingBox,
    pub time_periods: TimePeriodBounds,
    pub trip_file_prefix: String,
    pub gps_file_prefix: String,
    /// Offending row keys kept per removal reason.
    pub diagnostic_sample_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            delimiter: ',',
            max_duration_minutes: 1440.0,
            min_distance_km: 0.0,
            max_distance_km: 100.0,
            bounding_box: BoundingBox::default(),
            time_periods: TimePeriodBounds::default(),
            trip_file_prefix: "routes_".to_string(),
            gps_file_prefix: "locations_".to_string(),
            diagnostic_sample_size: 5,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. Keys that are absent
    /// keep their default value.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::config(path, e.to_string()))?;
        let config: PipelineConfig =
            serde_json::from_str(&content).map_err(|e| PipelineError::config(path, e.to_string()))?;
        config
            .validate()
            .map_err(|reason| PipelineError::config(path, reason))?;
        Ok(config)
    }

    /// Checks that bounds are ordered and period starts are increasing hours.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let bbox = &self.bounding_box;
        if bbox.min_lat > bbox.max_lat || bbox.min_lon > bbox.max_lon {
            return Err("bounding box minimum exceeds maximum".to_string());
        }
        if self.min_distance_km > self.max_distance_km {
            return Err("min_distance_km exceeds max_distance_km".to_string());
        }
        if self.max_duration_minutes <= 0.0 {
            return Err("max_duration_minutes must be positive".to_string());
        }
        if !self.delimiter.is_ascii() {
            return Err(format!("delimiter {:?} is not a single-byte character", self.delimiter));
        }
        let p = &self.time_periods;
        if !(p.morning_start < p.afternoon_start
            && p.afternoon_start < p.evening_start
            && p.evening_start < p.night_start
            && p.night_start <= 24)
        {
            return Err("time period starts must be strictly increasing hours".to_string());
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}
