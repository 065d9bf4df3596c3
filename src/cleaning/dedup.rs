//! Duplicate trip removal.

use std::collections::HashSet;

use crate::records::ValidTrip;
use crate::report::{DatasetLedger, RemovalReason};

/// Keeps the first trip for each `trip_id`, in input order, and counts every
/// later occurrence as `duplicate_trip`.
///
/// GPS points are never deduplicated: repeated samples are valid data.
#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn deduplicate_trips(mut rows: Vec<ValidTrip>, ledger: &mut DatasetLedger) -> Vec<ValidTrip> {
    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    rows.retain(|row| {
        if seen.contains(&row.record.trip_id) {
            ledger.record(RemovalReason::DuplicateTrip, &row.record.trip_id);
            false
        } else {
            seen.insert(row.record.trip_id.clone());
            true
        }
    });

    ledger.log_removals("dedup", &[RemovalReason::DuplicateTrip]);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DatasetKind, TripRecord};
    use chrono::NaiveDate;

    fn valid(id: &str, source_date: &str) -> ValidTrip {
        let ts = NaiveDate::from_ymd_opt(2019, 7, 18)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        ValidTrip {
            record: TripRecord {
                trip_id: id.to_string(),
                source_date: source_date.to_string(),
                ..Default::default()
            },
            unlock_timestamp: ts,
            lock_timestamp: ts,
            duration_minutes: 1.0,
            distance_km: 1.0,
        }
    }

    #[test]
    fn test_keeps_first_occurrence() {
        let mut ledger = DatasetLedger::new(DatasetKind::Trips, 5);
        let kept = deduplicate_trips(
            vec![
                valid("T100", "2019-07-01"),
                valid("T200", "2019-07-01"),
                valid("T100", "2019-07-02"),
            ],
            &mut ledger,
        );

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].record.trip_id, "T100");
        assert_eq!(kept[0].record.source_date, "2019-07-01");
        assert_eq!(kept[1].record.trip_id, "T200");
        assert_eq!(ledger.removed(RemovalReason::DuplicateTrip), 1);
    }

    #[test]
    fn test_counts_rows_not_groups() {
        let mut ledger = DatasetLedger::new(DatasetKind::Trips, 5);
        let rows = vec![valid("A", "d"), valid("A", "d"), valid("A", "d"), valid("B", "d"), valid("B", "d")];
        let kept = deduplicate_trips(rows, &mut ledger);
        assert_eq!(kept.len(), 2);
        assert_eq!(ledger.removed(RemovalReason::DuplicateTrip), 3);
    }
}
