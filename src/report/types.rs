//! Data types of the quality report.

use serde::Serialize;

use super::ledger::{DatasetLedger, RemovalReason};
use crate::records::DatasetKind;

/// A single value in a report section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    Count(usize),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub label: String,
    pub value: ReportValue,
}

/// A titled, ordered list of label/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub entries: Vec<ReportEntry>,
}

impl ReportSection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, value: ReportValue) {
        self.entries.push(ReportEntry {
            label: label.into(),
            value,
        });
    }

    pub fn count(&mut self, label: impl Into<String>, n: usize) {
        self.push(label, ReportValue::Count(n));
    }

    pub fn number(&mut self, label: impl Into<String>, x: f64) {
        self.push(label, ReportValue::Number(x));
    }

    pub fn get(&self, label: &str) -> Option<&ReportValue> {
        self.entries.iter().find(|e| e.label == label).map(|e| &e.value)
    }
}

/// Result of one pipeline run. Holds counts and statistics only, never
/// references into the cleaned tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub trips: DatasetLedger,
    pub gps_points: DatasetLedger,
    pub sections: Vec<ReportSection>,
}

impl QualityReport {
    pub fn ledger(&self, kind: DatasetKind) -> &DatasetLedger {
        match kind {
            DatasetKind::Trips => &self.trips,
            DatasetKind::GpsPoints => &self.gps_points,
        }
    }

    pub fn removed(&self, kind: DatasetKind, reason: RemovalReason) -> usize {
        self.ledger(kind).removed(reason)
    }

    pub fn section(&self, title: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.title == title)
    }
}
