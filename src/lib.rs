pub mod cleaning;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod schema;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{PipelineInputs, PipelineOutput, run, run_tables};
