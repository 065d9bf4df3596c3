//! Per-dataset removal bookkeeping.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::records::DatasetKind;

/// Why a row was dropped. Variant order is the order checks are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    InvalidUnlock,
    InvalidLock,
    LockNotAfterUnlock,
    InvalidDuration,
    InvalidDistance,
    InvalidCost,
    DuplicateTrip,
    InvalidCoordTimestamp,
    InvalidGps,
    OrphanGpsPoint,
}

impl RemovalReason {
    pub const TRIP_REASONS: &'static [RemovalReason] = &[
        RemovalReason::InvalidUnlock,
        RemovalReason::InvalidLock,
        RemovalReason::LockNotAfterUnlock,
        RemovalReason::InvalidDuration,
        RemovalReason::InvalidDistance,
        RemovalReason::InvalidCost,
        RemovalReason::DuplicateTrip,
    ];

    pub const GPS_REASONS: &'static [RemovalReason] = &[
        RemovalReason::InvalidCoordTimestamp,
        RemovalReason::InvalidGps,
        RemovalReason::OrphanGpsPoint,
    ];

    pub fn for_kind(kind: DatasetKind) -> &'static [RemovalReason] {
        match kind {
            DatasetKind::Trips => Self::TRIP_REASONS,
            DatasetKind::GpsPoints => Self::GPS_REASONS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::InvalidUnlock => "invalid_unlock",
            RemovalReason::InvalidLock => "invalid_lock",
            RemovalReason::LockNotAfterUnlock => "lock_not_after_unlock",
            RemovalReason::InvalidDuration => "invalid_duration",
            RemovalReason::InvalidDistance => "invalid_distance",
            RemovalReason::InvalidCost => "invalid_cost",
            RemovalReason::DuplicateTrip => "duplicate_trip",
            RemovalReason::InvalidCoordTimestamp => "invalid_coord_timestamp",
            RemovalReason::InvalidGps => "invalid_gps",
            RemovalReason::OrphanGpsPoint => "orphan_gps_point",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Initial count, removals by reason and final count for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetLedger {
    pub kind: DatasetKind,
    pub initial: usize,
    pub removals: BTreeMap<RemovalReason, usize>,
    /// First offending trip ids per reason, capped at `sample_size`.
    pub samples: BTreeMap<RemovalReason, Vec<String>>,
    pub final_count: Option<usize>,
    #[serde(skip)]
    sample_size: usize,
}

impl DatasetLedger {
    pub fn new(kind: DatasetKind, sample_size: usize) -> Self {
        Self {
            kind,
            initial: 0,
            removals: RemovalReason::for_kind(kind).iter().map(|&r| (r, 0)).collect(),
            samples: BTreeMap::new(),
            final_count: None,
            sample_size,
        }
    }

    pub fn set_initial(&mut self, initial: usize) {
        self.initial = initial;
    }

    pub fn record(&mut self, reason: RemovalReason, key: &str) {
        *self.removals.entry(reason).or_default() += 1;
        let sample = self.samples.entry(reason).or_default();
        if sample.len() < self.sample_size {
            sample.push(key.to_string());
        }
    }

    pub fn removed(&self, reason: RemovalReason) -> usize {
        self.removals.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_removed(&self) -> usize {
        self.removals.values().sum()
    }

    pub fn close(&mut self, final_count: usize) {
        self.final_count = Some(final_count);
    }

    /// `initial == final + removed`, once the ledger is closed.
    pub fn is_conserved(&self) -> bool {
        self.final_count
            .is_some_and(|f| self.initial == f + self.total_removed())
    }

    /// Logs every non-zero counter among `reasons`.
    pub fn log_removals(&self, stage: &str, reasons: &[RemovalReason]) {
        for reason in reasons {
            let count = self.removed(*reason);
            if count > 0 {
                info!(dataset = %self.kind, stage, reason = %reason, count, "Rows removed");
            }
        }
    }
}
