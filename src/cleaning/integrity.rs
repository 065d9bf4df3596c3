//! Referential integrity between GPS points and trips.

use std::collections::HashSet;

use crate::records::{ValidGpsPoint, ValidTrip};
use crate::report::{DatasetLedger, RemovalReason};

/// Drops every GPS point whose `trip_id` is not among `trips`.
///
/// Must run after trip cleaning is complete. The check is one-directional:
/// trips without GPS coverage are kept.
#[tracing::instrument(skip_all, fields(points = points.len(), trips = trips.len()))]
pub fn retain_referenced_points(
    mut points: Vec<ValidGpsPoint>,
    trips: &[ValidTrip],
    ledger: &mut DatasetLedger,
) -> Vec<ValidGpsPoint> {
    let trip_ids: HashSet<&str> = trips.iter().map(|t| t.record.trip_id.as_str()).collect();

    points.retain(|point| {
        let known = trip_ids.contains(point.record.trip_id.as_str());
        if !known {
            ledger.record(RemovalReason::OrphanGpsPoint, &point.record.trip_id);
        }
        known
    });

    ledger.log_removals("integrity", &[RemovalReason::OrphanGpsPoint]);
    points
}
