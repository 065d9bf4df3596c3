//! Error types for the preprocessing pipeline.
//!
//! Only conditions that abort a run live here. Row-level validation failures
//! are never errors: they are counted in the quality ledger and the row is
//! dropped.

use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input file is missing, unreadable, malformed or has no columns.
    #[error("failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// One or more expected columns are absent from a loaded table.
    #[error("{dataset} table is missing required columns: {}", .missing.join(", "))]
    Schema {
        dataset: String,
        missing: Vec<String>,
    },

    #[error("invalid configuration {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn load(path: &Path, reason: impl Into<String>) -> Self {
        PipelineError::Load {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn config(path: &Path, reason: impl Into<String>) -> Self {
        PipelineError::Config {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Load { .. } => "load",
            PipelineError::Schema { .. } => "schema",
            PipelineError::Config { .. } => "config",
            PipelineError::Io(_) | PipelineError::Csv(_) | PipelineError::Json(_) => "output",
        }
    }
}
