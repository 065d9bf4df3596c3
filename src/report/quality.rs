//! Builds the quality report from the removal ledgers and the cleaned tables.

use std::collections::HashSet;
use std::hash::Hash;

use super::ledger::DatasetLedger;
use super::summary::{AxisRange, GeoRange, NumericSummary};
use super::types::{QualityReport, ReportSection, ReportValue};
use crate::config::PipelineConfig;
use crate::records::{DatasetKind, GpsPoint, Trip};
use crate::schema::SchemaProfile;

/// Percentage of `part` in `total`, 0.0 when `total` is zero.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

fn unique_count<T, I>(values: I) -> usize
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    values.into_iter().collect::<HashSet<T>>().len()
}

/// Collects counts while the pipeline runs and turns them into a
/// [`QualityReport`] once the cleaned tables are final.
#[derive(Debug)]
pub struct QualityReporter {
    pub trips: DatasetLedger,
    pub gps_points: DatasetLedger,
    trip_profile: Option<SchemaProfile>,
    gps_profile: Option<SchemaProfile>,
    initial_duplicate_trips: usize,
}

impl QualityReporter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            trips: DatasetLedger::new(DatasetKind::Trips, config.diagnostic_sample_size),
            gps_points: DatasetLedger::new(DatasetKind::GpsPoints, config.diagnostic_sample_size),
            trip_profile: None,
            gps_profile: None,
            initial_duplicate_trips: 0,
        }
    }

    pub fn ledger_mut(&mut self, kind: DatasetKind) -> &mut DatasetLedger {
        match kind {
            DatasetKind::Trips => &mut self.trips,
            DatasetKind::GpsPoints => &mut self.gps_points,
        }
    }

    /// Records the initial state of a dataset from its schema profile.
    pub fn record_initial(&mut self, profile: SchemaProfile) {
        self.ledger_mut(profile.kind).set_initial(profile.rows);
        match profile.kind {
            DatasetKind::Trips => self.trip_profile = Some(profile),
            DatasetKind::GpsPoints => self.gps_profile = Some(profile),
        }
    }

    /// Duplicate trip ids present before any cleaning.
    pub fn record_initial_duplicates(&mut self, duplicates: usize) {
        self.initial_duplicate_trips = duplicates;
    }

    pub fn finish(mut self, trips: &[Trip], gps_points: &[GpsPoint]) -> QualityReport {
        self.trips.close(trips.len());
        self.gps_points.close(gps_points.len());

        let mut sections = Vec::new();
        sections.push(initial_section(
            DatasetKind::Trips,
            self.trip_profile.as_ref(),
            Some(self.initial_duplicate_trips),
        ));
        sections.push(initial_section(
            DatasetKind::GpsPoints,
            self.gps_profile.as_ref(),
            None,
        ));
        sections.push(removals_section(&self.trips));
        sections.push(removals_section(&self.gps_points));
        sections.push(final_section(&self.trips));
        sections.push(final_section(&self.gps_points));
        sections.push(trip_unique_section(trips));
        sections.push(trip_numeric_section(trips));
        sections.push(gps_unique_section(gps_points));
        sections.push(gps_range_section(gps_points));
        sections.push(samples_section(&self.trips, &self.gps_points));

        QualityReport {
            trips: self.trips,
            gps_points: self.gps_points,
            sections,
        }
    }
}

fn initial_section(
    kind: DatasetKind,
    profile: Option<&SchemaProfile>,
    duplicates: Option<usize>,
) -> ReportSection {
    let mut section = ReportSection::new(format!("{} - initial state", kind.title()));
    let Some(profile) = profile else {
        return section;
    };

    section.count("records", profile.rows);
    section.count("columns", profile.columns);
    if let Some(duplicates) = duplicates {
        section.count("duplicate_trip_ids", duplicates);
    }
    for column in &profile.column_profiles {
        section.count(format!("{}.null_count", column.name), column.null_count);
        section.number(format!("{}.null_pct", column.name), column.null_pct);
    }
    section
}

fn removals_section(ledger: &DatasetLedger) -> ReportSection {
    let mut section = ReportSection::new(format!("{} - removals", ledger.kind.title()));
    for (reason, &count) in &ledger.removals {
        section.count(reason.as_str(), count);
        section.number(format!("{}_pct", reason.as_str()), pct(count, ledger.initial));
    }
    section
}

fn final_section(ledger: &DatasetLedger) -> ReportSection {
    let final_count = ledger.final_count.unwrap_or(0);
    let removed = ledger.initial.saturating_sub(final_count);

    let mut section = ReportSection::new(format!("{} - final", ledger.kind.title()));
    section.count("initial_records", ledger.initial);
    section.count("cleaned_records", final_count);
    section.count("removed_records", removed);
    section.number("data_loss_pct", pct(removed, ledger.initial));
    section
}

fn trip_unique_section(trips: &[Trip]) -> ReportSection {
    let mut section = ReportSection::new("Trips - unique values");
    section.count("trip_id", unique_count(trips.iter().map(|t| t.trip_id.as_str())));
    section.count("bike_id", unique_count(trips.iter().map(|t| t.bike_id.as_str())));
    section.count(
        "start_station",
        unique_count(trips.iter().map(|t| t.start_station.as_str())),
    );
    section.count(
        "end_station",
        unique_count(trips.iter().map(|t| t.end_station.as_str())),
    );
    section.count(
        "membership_type",
        unique_count(trips.iter().map(|t| t.membership_type.as_str())),
    );
    section.count("bike_type", unique_count(trips.iter().map(|t| &t.bike_type)));
    section
}

fn push_summary(section: &mut ReportSection, column: &str, values: Vec<f64>) {
    match NumericSummary::from_values(values) {
        Some(s) => {
            section.count(format!("{column}.count"), s.count);
            section.number(format!("{column}.mean"), s.mean);
            section.number(format!("{column}.median"), s.median);
            section.number(format!("{column}.std"), s.std);
            section.number(format!("{column}.min"), s.min);
            section.number(format!("{column}.max"), s.max);
        }
        None => section.count(format!("{column}.count"), 0),
    }
}

fn trip_numeric_section(trips: &[Trip]) -> ReportSection {
    let mut section = ReportSection::new("Trips - numeric summary");
    push_summary(
        &mut section,
        "duration_minutes",
        trips.iter().map(|t| t.duration_minutes).collect(),
    );
    push_summary(
        &mut section,
        "distance_km",
        trips.iter().map(|t| t.distance_km).collect(),
    );
    push_summary(
        &mut section,
        "cost",
        trips.iter().filter_map(|t| t.cost).collect(),
    );
    section
}

fn gps_unique_section(points: &[GpsPoint]) -> ReportSection {
    let mut section = ReportSection::new("GPS points - unique values");
    section.count("trip_id", unique_count(points.iter().map(|p| p.trip_id.as_str())));
    section.count("bike_id", unique_count(points.iter().map(|p| p.bike_id.as_str())));
    section
}

/// Geographic extent of the cleaned GPS points.
pub fn geo_range(points: &[GpsPoint]) -> Option<GeoRange> {
    let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
    let lons: Vec<f64> = points.iter().map(|p| p.longitude).collect();
    Some(GeoRange {
        latitude: AxisRange::from_values(&lats)?,
        longitude: AxisRange::from_values(&lons)?,
    })
}

fn gps_range_section(points: &[GpsPoint]) -> ReportSection {
    let mut section = ReportSection::new("GPS points - geographic range");
    if let Some(range) = geo_range(points) {
        for (axis, r) in [("latitude", &range.latitude), ("longitude", &range.longitude)] {
            section.number(format!("{axis}.min"), r.min);
            section.number(format!("{axis}.max"), r.max);
            section.number(format!("{axis}.mean"), r.mean);
        }
    }
    section
}

fn samples_section(trips: &DatasetLedger, gps_points: &DatasetLedger) -> ReportSection {
    let mut section = ReportSection::new("Removal samples");
    for ledger in [trips, gps_points] {
        for (reason, keys) in &ledger.samples {
            if keys.is_empty() {
                continue;
            }
            section.push(
                format!("{}.{}", ledger.kind.label(), reason.as_str()),
                ReportValue::List(keys.clone()),
            );
        }
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ledger::RemovalReason;
    use crate::records::{BikeType, TimePeriod};
    use chrono::NaiveDate;

    fn trip(id: &str, duration: f64, cost: Option<f64>) -> Trip {
        let unlock = NaiveDate::from_ymd_opt(2019, 7, 18)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Trip {
            trip_id: id.to_string(),
            bike_id: "B1".to_string(),
            start_station: "Raatuse".to_string(),
            end_station: "Kaubamaja".to_string(),
            unlock_date_raw: "2019-07-18".to_string(),
            unlock_time_raw: "08:00:00".to_string(),
            lock_date_raw: "2019-07-18".to_string(),
            lock_time_raw: "08:15:00".to_string(),
            distance_km: 2.0,
            membership_type: "Monthly".to_string(),
            cost,
            payment_id: String::new(),
            bike_type: BikeType::Pedelec,
            source_date: "2019-07".to_string(),
            unlock_timestamp: unlock,
            lock_timestamp: unlock,
            duration_minutes: duration,
            unlock_hour: 8,
            unlock_dayofweek: 3,
            unlock_date: unlock.date(),
            unlock_month: 7,
            unlock_day: 18,
            is_weekend: false,
            time_period: TimePeriod::Morning,
        }
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
        assert_eq!(pct(1, 4), 25.0);
    }

    #[test]
    fn test_finish_builds_ordered_sections() {
        let mut reporter = QualityReporter::new(&PipelineConfig::default());
        reporter.trips.set_initial(3);
        reporter.trips.record(RemovalReason::DuplicateTrip, "T1");

        let trips = vec![trip("T1", 10.0, Some(1.0)), trip("T2", 20.0, None)];
        let report = reporter.finish(&trips, &[]);

        assert!(report.trips.is_conserved());
        assert!(report.gps_points.is_conserved());
        assert_eq!(report.sections[0].title, "Trips - initial state");
        assert_eq!(report.sections.last().unwrap().title, "Removal samples");

        let removals = report.section("Trips - removals").unwrap();
        assert_eq!(removals.get("duplicate_trip"), Some(&ReportValue::Count(1)));

        let numeric = report.section("Trips - numeric summary").unwrap();
        assert_eq!(numeric.get("duration_minutes.mean"), Some(&ReportValue::Number(15.0)));
        assert_eq!(numeric.get("cost.count"), Some(&ReportValue::Count(1)));

        let geo = report.section("GPS points - geographic range").unwrap();
        assert!(geo.entries.is_empty());
    }

    #[test]
    fn test_unique_values_ignore_repeats() {
        let trips = vec![trip("T1", 10.0, None), trip("T2", 10.0, None)];
        let section = trip_unique_section(&trips);
        assert_eq!(section.get("trip_id"), Some(&ReportValue::Count(2)));
        assert_eq!(section.get("bike_id"), Some(&ReportValue::Count(1)));
        assert_eq!(section.get("bike_type"), Some(&ReportValue::Count(1)));
    }
}
