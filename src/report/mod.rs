//! Data quality reporting.
//!
//! Stages record every dropped row in a [`DatasetLedger`] owned by the
//! [`QualityReporter`]. Once the cleaned tables are final, the reporter adds
//! unique-value counts, numeric summaries and the geographic range and
//! produces a [`QualityReport`]: an ordered list of sections that a renderer
//! can turn into text, plus the typed ledgers.

pub mod ledger;
pub mod quality;
pub mod summary;
pub mod types;

pub use ledger::{DatasetLedger, RemovalReason};
pub use quality::QualityReporter;
pub use types::{QualityReport, ReportEntry, ReportSection, ReportValue};
