//! Read-only view of the statistics table for reporting.

use super::aggregate::read_statistics;
use super::error::Result;
use super::types::StatisticsRow;
use log::{info, warn};
use serde::Serialize;
use std::path::Path;

pub const TOP_OPENINGS: usize = 20;
const WIN_RATE_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Summary {
    /// No statistics table yet; the pipeline is still running or never ran.
    Processing,
    Ready {
        openings: usize,
        most_played: Option<String>,
        /// Best white win rate among the most played openings.
        best_white_win_rate_top10: Option<f64>,
        top: Vec<StatisticsRow>,
    },
}

pub fn summarize(stats_file: &Path) -> Result<Summary> {
    if !stats_file.exists() {
        warn!("No statistics at {}, still processing", stats_file.display());
        return Ok(Summary::Processing);
    }

    let rows = read_statistics(stats_file)?;
    info!("Loaded {} openings from {}", rows.len(), stats_file.display());
    Ok(summarize_rows(rows))
}

pub fn summarize_rows(mut rows: Vec<StatisticsRow>) -> Summary {
    let openings = rows.len();
    let most_played = rows.first().map(|r| r.opening_code.clone());
    let best_white_win_rate_top10 = rows
        .iter()
        .take(WIN_RATE_WINDOW)
        .map(|r| r.white_win_rate)
        .reduce(f64::max);
    rows.truncate(TOP_OPENINGS);

    Summary::Ready {
        openings,
        most_played,
        best_white_win_rate_top10,
        top: rows,
    }
}
