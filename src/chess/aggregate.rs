use super::chunk::ChunkManifest;
use super::config::PipelineConfig;
use super::db;
use super::error::{Error, Result};
use super::types::StatisticsRow;
use duckdb::Connection;
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Openings with fewer qualifying games than this are left out of the table.
pub const MIN_GAMES_PER_OPENING: u64 = 10;

const STATS_TABLE: &str = "opening_stats";

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub stats_file: PathBuf,
    pub chunk_files: usize,
    pub rows_read: u64,
    /// Rows with a positive rating on both sides.
    pub rows_rated: u64,
    pub openings: Vec<StatisticsRow>,
}

#[derive(Debug)]
pub enum AggregateOutcome {
    NoChunks,
    Written(AggregateReport),
}

/// Recomputes the per-opening table from every chunk file in
/// `config.output_dir` and replaces `config.stats_file` with it.
///
/// With no chunk files the existing table is left untouched.
pub fn run_aggregate(config: &PipelineConfig) -> Result<AggregateOutcome> {
    let manifest = ChunkManifest::scan(&config.output_dir)?;
    if manifest.is_empty() {
        warn!(
            "{}",
            Error::NoChunks {
                dir: config.output_dir.clone(),
            }
        );
        return Ok(AggregateOutcome::NoChunks);
    }
    info!(
        "Aggregating {} chunk files from {}",
        manifest.len(),
        config.output_dir.display()
    );

    let conn = db::open_session()?;
    conn.execute_batch(&format!("SET threads TO {};", config.workers.max(1)))
        .map_err(|e| Error::database("configure aggregation session", e))?;

    let (rows_read, rows_rated) = count_rows(&conn, &manifest)?;
    build_statistics(&conn, &manifest)?;
    let openings = load_statistics(&conn, STATS_TABLE)?;
    write_statistics(&conn, &config.stats_file)?;

    info!(
        "Wrote {} openings ({} of {} rows rated) to {}",
        openings.len(),
        rows_rated,
        rows_read,
        config.stats_file.display()
    );

    Ok(AggregateOutcome::Written(AggregateReport {
        stats_file: config.stats_file.clone(),
        chunk_files: manifest.len(),
        rows_read,
        rows_rated,
        openings,
    }))
}

fn count_rows(conn: &Connection, manifest: &ChunkManifest) -> Result<(u64, u64)> {
    let sql = format!(
        r#"SELECT count(*), count(*) FILTER (WHERE "whiteElo" > 0 AND "blackElo" > 0)
           FROM {}"#,
        manifest.sql_source()
    );
    let (total, rated): (i64, i64) = conn
        .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| Error::database("count chunk rows", e))?;
    Ok((total.max(0) as u64, rated.max(0) as u64))
}

fn build_statistics(conn: &Connection, manifest: &ChunkManifest) -> Result<()> {
    let sql = format!(
        r#"CREATE TABLE {STATS_TABLE} AS
           SELECT
               "openingCode",
               count(*) AS "totalGames",
               avg(CAST("result" = '1-0' AS DOUBLE)) AS "whiteWinRate",
               CAST(avg("whiteElo") AS DOUBLE) AS "avgWhiteElo"
           FROM {source}
           WHERE "whiteElo" > 0 AND "blackElo" > 0
           GROUP BY "openingCode"
           HAVING count(*) >= {MIN_GAMES_PER_OPENING};"#,
        source = manifest.sql_source()
    );
    conn.execute_batch(&sql)
        .map_err(|e| Error::database("aggregate chunk files", e))
}

fn ordered(relation: &str) -> String {
    format!(
        r#"SELECT "openingCode", "totalGames", "whiteWinRate", "avgWhiteElo"
           FROM {relation}
           ORDER BY "totalGames" DESC, "openingCode" ASC"#
    )
}

fn load_statistics(conn: &Connection, relation: &str) -> Result<Vec<StatisticsRow>> {
    let context = || format!("read statistics from {relation}");
    let mut stmt = conn
        .prepare(&ordered(relation))
        .map_err(|e| Error::database(context(), e))?;
    let rows = stmt
        .query_map([], |row| {
            let total_games: i64 = row.get(1)?;
            Ok(StatisticsRow {
                opening_code: row.get(0)?,
                total_games: total_games.max(0) as u64,
                white_win_rate: row.get(2)?,
                avg_white_elo: row.get(3)?,
            })
        })
        .map_err(|e| Error::database(context(), e))?;

    let collected: std::result::Result<Vec<_>, _> = rows.collect();
    collected.map_err(|e| Error::database(context(), e))
}

/// Replaces `path` in one step: the table is written next to it and renamed
/// over the old file.
fn write_statistics(conn: &Connection, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::output(parent, e))?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let copied = conn.execute_batch(&format!(
        "COPY ({}) TO {} (FORMAT PARQUET);",
        ordered(STATS_TABLE),
        db::quote_path(&staging)
    ));
    if let Err(err) = copied {
        let _ = fs::remove_file(&staging);
        return Err(Error::database(format!("write {}", path.display()), err));
    }

    fs::rename(&staging, path).map_err(|e| Error::output(path, e))
}

/// Reads a statistics table written by [`run_aggregate`], in table order.
pub fn read_statistics(path: &Path) -> Result<Vec<StatisticsRow>> {
    let conn = db::open_session()?;
    let relation = format!("read_parquet({})", db::quote_path(path));
    load_statistics(&conn, &relation)
}
