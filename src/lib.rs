//! Batch pipeline over compressed PGN archives: streams every archive into
//! Parquet chunk files in parallel, then aggregates the chunks into a
//! per-opening statistics table.

pub mod chess;

pub use chess::{
    AggregateOutcome, ConfigArgs, Error, IngestOutcome, PipelineConfig, Result, RunSummary,
    Summary, run_aggregate, run_ingest, summarize,
};
