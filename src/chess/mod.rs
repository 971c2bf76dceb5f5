pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod extract;
pub mod locator;
pub mod reader;
pub mod summary;
pub mod types;
pub mod visitor;

#[cfg(test)]
mod fixtures;

pub use aggregate::{AggregateOutcome, AggregateReport, run_aggregate};
pub use config::{ConfigArgs, PipelineConfig};
pub use coordinator::{IngestOutcome, RunSummary, run_ingest};
pub use error::{Error, Result};
pub use summary::{Summary, summarize};
pub use types::{ArchiveId, ExtractedRow, GameRecord, StatisticsRow};
