//! Column manifests and schema validation.
//!
//! Input manifests list the raw columns each dataset must carry; a table
//! missing any of them is rejected before row-level processing starts.
//! Output manifests describe the cleaned tables column by column.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::loader::{RawTable, SOURCE_DATE_COLUMN};
use crate::records::DatasetKind;

/// An expected input column and whether empty cells are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub nullable: bool,
}

const fn required(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        nullable: false,
    }
}

const fn nullable(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        nullable: true,
    }
}

pub const TRIP_INPUT_COLUMNS: &[ColumnSpec] = &[
    required("route_code"),
    required("cyclenumber"),
    nullable("startstationname"),
    nullable("endstationname"),
    required("unlockedat"),
    required("unlockedattime"),
    required("lockedat"),
    required("lockedattime"),
    required("length"),
    nullable("Membership"),
    nullable("costs"),
    nullable("rfidnumber"),
    nullable("CycleType"),
];

pub const GPS_INPUT_COLUMNS: &[ColumnSpec] = &[
    required("route_code"),
    nullable("cyclenumber"),
    required("latitude"),
    required("longitude"),
    required("coord_date"),
    required("coord_time"),
];

/// Expected raw columns of a dataset kind.
pub fn input_columns(kind: DatasetKind) -> &'static [ColumnSpec] {
    match kind {
        DatasetKind::Trips => TRIP_INPUT_COLUMNS,
        DatasetKind::GpsPoints => GPS_INPUT_COLUMNS,
    }
}

/// Semantic type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SemanticType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Category,
}

pub const TRIP_OUTPUT_COLUMNS: &[(&str, SemanticType)] = &[
    ("trip_id", SemanticType::Text),
    ("bike_id", SemanticType::Text),
    ("start_station", SemanticType::Text),
    ("end_station", SemanticType::Text),
    ("unlock_date_raw", SemanticType::Text),
    ("unlock_time_raw", SemanticType::Text),
    ("lock_date_raw", SemanticType::Text),
    ("lock_time_raw", SemanticType::Text),
    ("distance_km", SemanticType::Float),
    ("membership_type", SemanticType::Category),
    ("cost", SemanticType::Float),
    ("payment_id", SemanticType::Text),
    ("bike_type", SemanticType::Category),
    ("source_date", SemanticType::Text),
    ("unlock_timestamp", SemanticType::Timestamp),
    ("lock_timestamp", SemanticType::Timestamp),
    ("duration_minutes", SemanticType::Float),
    ("unlock_hour", SemanticType::Integer),
    ("unlock_dayofweek", SemanticType::Integer),
    ("unlock_date", SemanticType::Date),
    ("unlock_month", SemanticType::Integer),
    ("unlock_day", SemanticType::Integer),
    ("is_weekend", SemanticType::Boolean),
    ("time_period", SemanticType::Category),
];

pub const GPS_OUTPUT_COLUMNS: &[(&str, SemanticType)] = &[
    ("trip_id", SemanticType::Text),
    ("bike_id", SemanticType::Text),
    ("latitude", SemanticType::Float),
    ("longitude", SemanticType::Float),
    ("coord_date_raw", SemanticType::Text),
    ("coord_time_raw", SemanticType::Text),
    ("source_date", SemanticType::Text),
    ("recorded_timestamp", SemanticType::Timestamp),
    ("coord_hour", SemanticType::Integer),
    ("coord_minute", SemanticType::Integer),
    ("coord_second", SemanticType::Integer),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub position: usize,
    pub name: &'static str,
    pub semantic_type: SemanticType,
}

/// Ordered column manifest of a cleaned table.
pub fn output_manifest(kind: DatasetKind) -> Vec<ManifestEntry> {
    let columns = match kind {
        DatasetKind::Trips => TRIP_OUTPUT_COLUMNS,
        DatasetKind::GpsPoints => GPS_OUTPUT_COLUMNS,
    };
    columns
        .iter()
        .enumerate()
        .map(|(i, &(name, semantic_type))| ManifestEntry {
            position: i + 1,
            name,
            semantic_type,
        })
        .collect()
}

/// Null statistics for one expected column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub nullable: bool,
    pub null_count: usize,
    pub null_pct: f64,
}

/// Shape of a loaded table as seen by the validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaProfile {
    pub kind: DatasetKind,
    pub rows: usize,
    pub columns: usize,
    pub column_profiles: Vec<ColumnProfile>,
}

/// Whether a raw cell counts as null.
pub fn is_null_cell(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v.eq_ignore_ascii_case("nan")
        || v.eq_ignore_ascii_case("null")
        || v.eq_ignore_ascii_case("na")
        || v.eq_ignore_ascii_case("n/a")
}

/// Checks that every column in `manifest` is present in `table`.
///
/// # Errors
///
/// Returns [`PipelineError::Schema`] listing all missing columns.
pub fn validate_schema(table: &RawTable, manifest: &[ColumnSpec]) -> Result<SchemaProfile> {
    let missing: Vec<String> = manifest
        .iter()
        .filter(|spec| spec.name != SOURCE_DATE_COLUMN && table.column_index(spec.name).is_none())
        .map(|spec| spec.name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::Schema {
            dataset: table.kind.label().to_string(),
            missing,
        });
    }

    let rows = table.len();
    let column_profiles = manifest
        .iter()
        .map(|spec| {
            let null_count = table.column_values(spec.name).filter(|v| is_null_cell(v)).count();
            if null_count > 0 && !spec.nullable {
                warn!(
                    dataset = %table.kind,
                    column = spec.name,
                    null_count,
                    "Non-nullable column contains nulls"
                );
            }
            ColumnProfile {
                name: spec.name.to_string(),
                nullable: spec.nullable,
                null_count,
                null_pct: if rows == 0 {
                    0.0
                } else {
                    null_count as f64 / rows as f64 * 100.0
                },
            }
        })
        .collect();

    info!(dataset = %table.kind, rows, columns = table.column_count(), "Schema validated");

    Ok(SchemaProfile {
        kind: table.kind,
        rows,
        columns: table.column_count(),
        column_profiles,
    })
}
