use super::chunk::ChunkWriter;
use super::config::PipelineConfig;
use super::error::{Error, Result};
use super::extract::extract_row;
use super::locator::locate_archives;
use super::reader::RecordStream;
use super::types::{ArchiveId, ExtractedRow};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Games between two progress lines of one archive.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Upper bound on the rows preallocated per worker buffer.
const MAX_BUFFER_PREALLOC: usize = 65_536;

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub archive: PathBuf,
    /// Games that reached a chunk file.
    pub games: u64,
    pub chunks: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub archives_found: usize,
    pub archives_failed: usize,
    pub games_ingested: u64,
    pub chunks_written: u64,
    pub elapsed_secs: f64,
    pub archives: Vec<ArchiveReport>,
}

#[derive(Debug)]
pub enum IngestOutcome {
    NoArchives,
    Completed(RunSummary),
}

/// Discovers archives, resets the output directory and ingests every archive
/// on a pool of `config.workers` threads, one archive per task.
pub fn run_ingest(config: &PipelineConfig) -> Result<IngestOutcome> {
    config.validate()?;
    let started = Instant::now();

    let archives = locate_archives(&config.source_dir, &config.archive_suffix)?;
    if archives.is_empty() {
        warn!(
            "{}",
            Error::NoArchives {
                dir: config.source_dir.clone(),
                suffix: config.archive_suffix.clone(),
            }
        );
        return Ok(IngestOutcome::NoArchives);
    }
    info!(
        "Found {} archives in {}",
        archives.len(),
        config.source_dir.display()
    );

    reset_output_dir(&config.output_dir);

    let ids: Vec<ArchiveId> = archives
        .iter()
        .enumerate()
        .map(|(ordinal, path)| ArchiveId::new(ordinal, path, &config.archive_suffix))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|idx| format!("ingest-{idx}"))
        .build()?;

    let reports: Vec<ArchiveReport> = pool.install(|| {
        ids.par_iter()
            .with_max_len(1)
            .map(|id| ingest_archive(id, config))
            .collect()
    });

    let summary = RunSummary {
        archives_found: reports.len(),
        archives_failed: reports.iter().filter(|r| r.error.is_some()).count(),
        games_ingested: reports.iter().map(|r| r.games).sum(),
        chunks_written: reports.iter().map(|r| u64::from(r.chunks)).sum(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        archives: reports,
    };

    info!(
        "Ingestion finished: {} archives ({} failed), {} games in {} chunks, {:.2}s",
        summary.archives_found,
        summary.archives_failed,
        summary.games_ingested,
        summary.chunks_written,
        summary.elapsed_secs
    );
    Ok(IngestOutcome::Completed(summary))
}

/// Deletes and recreates `dir`. Failures are logged, never fatal.
pub fn reset_output_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!("Cleared {}", dir.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("{}", Error::output(dir, err)),
    }

    if let Err(err) = fs::create_dir_all(dir) {
        error!("{}", Error::output(dir, err));
    }
}

/// Per-archive state: the row buffer and the chunk sequence it feeds.
struct ArchiveWorker<'a> {
    id: &'a ArchiveId,
    writer: ChunkWriter,
    buffer: Vec<ExtractedRow>,
    chunk_size: usize,
    next_sequence: u32,
    flushed_games: u64,
}

impl ArchiveWorker<'_> {
    fn push(&mut self, row: ExtractedRow) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.chunk_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self
            .writer
            .write_chunk(&self.buffer, self.id, self.next_sequence)?
            .is_some()
        {
            self.next_sequence += 1;
            self.flushed_games += self.buffer.len() as u64;
        }
        self.buffer.clear();
        Ok(())
    }

    fn report(&self, error: Option<Error>) -> ArchiveReport {
        ArchiveReport {
            archive: self.id.path.clone(),
            games: self.flushed_games,
            chunks: self.next_sequence,
            error: error.map(|e| e.to_string()),
        }
    }
}

fn failed_report(id: &ArchiveId, err: Error) -> ArchiveReport {
    error!("Archive {} failed: {}", id.path.display(), err);
    ArchiveReport {
        archive: id.path.clone(),
        games: 0,
        chunks: 0,
        error: Some(err.to_string()),
    }
}

/// Streams one archive into chunk files. Never fails: errors end up in the
/// returned report, after whatever was already buffered has been flushed.
fn ingest_archive(id: &ArchiveId, config: &PipelineConfig) -> ArchiveReport {
    let started = Instant::now();
    debug!("Ingesting {} as {}", id.path.display(), id);

    let mut stream = match RecordStream::open(&id.path) {
        Ok(stream) => stream,
        Err(err) => return failed_report(id, err),
    };
    let writer = match ChunkWriter::new(&config.output_dir) {
        Ok(writer) => writer,
        Err(err) => return failed_report(id, err),
    };

    let mut worker = ArchiveWorker {
        id,
        writer,
        buffer: Vec::with_capacity(config.chunk_size.min(MAX_BUFFER_PREALLOC)),
        chunk_size: config.chunk_size,
        next_sequence: 0,
        flushed_games: 0,
    };

    let mut games: u64 = 0;
    let mut archive_error: Option<Error> = None;
    let mut output_error: Option<Error> = None;

    loop {
        if let Some(limit) = config.max_games
            && games >= limit
        {
            info!(
                "{}: stopping at the configured ceiling of {} games",
                stream.path().display(),
                limit
            );
            break;
        }

        let Some(item) = stream.next() else { break };
        match item {
            Ok(game) => {
                games += 1;
                if games % PROGRESS_INTERVAL == 0 {
                    debug!("{}: {} games processed", id.path.display(), games);
                }
                if let Err(err) = worker.push(extract_row(game)) {
                    output_error = Some(err);
                    break;
                }
            }
            Err(err @ Error::RecordParse { .. }) => warn!("Skipping record: {}", err),
            Err(err) => {
                archive_error = Some(err);
                break;
            }
        }
    }

    // Best-effort: rows extracted before an archive failure are still kept.
    if output_error.is_none()
        && let Err(err) = worker.flush()
    {
        output_error = Some(err);
    }

    let error = output_error.or(archive_error);
    match &error {
        Some(err) => error!(
            "Archive {} failed after {} chunks: {}",
            id.path.display(),
            worker.next_sequence,
            err
        ),
        None => info!(
            "Ingested {}: {} games, {} chunks in {:.2}s",
            id.path.display(),
            worker.flushed_games,
            worker.next_sequence,
            started.elapsed().as_secs_f64()
        ),
    }
    worker.report(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::chunk::{ChunkManifest, read_chunk};
    use crate::chess::fixtures::{game, numbered_games, write_zstd_archive};
    use tempfile::TempDir;

    struct Workspace {
        _root: TempDir,
        config: PipelineConfig,
    }

    fn workspace(chunk_size: usize) -> Workspace {
        let root = TempDir::new().unwrap();
        let source_dir = root.path().join("archives");
        fs::create_dir(&source_dir).unwrap();
        let config = PipelineConfig {
            source_dir,
            output_dir: root.path().join("raw"),
            stats_file: root.path().join("processed/stats.parquet"),
            chunk_size,
            workers: 2,
            ..PipelineConfig::default()
        };
        Workspace {
            _root: root,
            config,
        }
    }

    fn completed(outcome: IngestOutcome) -> RunSummary {
        match outcome {
            IngestOutcome::Completed(summary) => summary,
            IngestOutcome::NoArchives => panic!("expected archives to be found"),
        }
    }

    fn chunk_names(dir: &Path) -> Vec<String> {
        ChunkManifest::scan(dir)
            .unwrap()
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn all_rows(dir: &Path) -> Vec<ExtractedRow> {
        ChunkManifest::scan(dir)
            .unwrap()
            .files
            .iter()
            .flat_map(|p| read_chunk(p).unwrap())
            .collect()
    }

    #[test]
    fn test_no_archives_leaves_output_untouched() {
        let ws = workspace(10);
        fs::create_dir_all(&ws.config.output_dir).unwrap();
        let stale = ws.config.output_dir.join("0000-old-00000.parquet");
        fs::write(&stale, b"old").unwrap();

        let outcome = run_ingest(&ws.config).unwrap();
        assert!(matches!(outcome, IngestOutcome::NoArchives));
        assert!(stale.exists());
    }

    #[test]
    fn test_rows_are_lossless_and_ordered_across_chunks() {
        let ws = workspace(10);
        write_zstd_archive(&ws.config.source_dir, "jan.pgn.zst", &numbered_games(25, "C00"));

        let summary = completed(run_ingest(&ws.config).unwrap());
        assert_eq!(summary.games_ingested, 25);
        assert_eq!(summary.chunks_written, 3);
        assert_eq!(
            chunk_names(&ws.config.output_dir),
            vec![
                "0000-jan-00000.parquet",
                "0000-jan-00001.parquet",
                "0000-jan-00002.parquet"
            ]
        );

        let rows = all_rows(&ws.config.output_dir);
        let elos: Vec<u32> = rows.iter().map(|r| r.white_elo).collect();
        assert_eq!(elos, (1000..1025).collect::<Vec<u32>>());
        assert!(rows.iter().all(|r| r.opening_code == "C00"));
    }

    #[test]
    fn test_chunk_names_unique_across_archives() {
        let ws = workspace(5);
        write_zstd_archive(&ws.config.source_dir, "a.pgn.zst", &numbered_games(10, "A00"));
        write_zstd_archive(&ws.config.source_dir, "b.pgn.zst", &numbered_games(10, "B00"));
        write_zstd_archive(&ws.config.source_dir, "a_.pgn.zst", &numbered_games(10, "C00"));

        let summary = completed(run_ingest(&ws.config).unwrap());
        assert_eq!(summary.archives_found, 3);
        assert_eq!(summary.chunks_written, 6);

        let names = chunk_names(&ws.config.output_dir);
        let mut unique = names.clone();
        unique.dedup();
        assert_eq!(names.len(), 6);
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_rerun_replaces_output_with_identical_content() {
        let ws = workspace(7);
        write_zstd_archive(&ws.config.source_dir, "a.pgn.zst", &numbered_games(20, "A00"));
        write_zstd_archive(&ws.config.source_dir, "b.pgn.zst", &numbered_games(9, "B00"));

        completed(run_ingest(&ws.config).unwrap());
        let first = all_rows(&ws.config.output_dir);

        let stale = ws.config.output_dir.join("9999-stale-00000.parquet");
        fs::write(&stale, b"stale").unwrap();

        completed(run_ingest(&ws.config).unwrap());
        let second = all_rows(&ws.config.output_dir);

        assert!(!stale.exists());
        assert_eq!(first.len(), 29);
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_archive_does_not_abort_siblings() {
        let ws = workspace(10);
        write_zstd_archive(&ws.config.source_dir, "good.pgn.zst", &numbered_games(12, "C00"));
        fs::write(
            ws.config.source_dir.join("bad.pgn.zst"),
            b"not a zstd stream at all",
        )
        .unwrap();

        let summary = completed(run_ingest(&ws.config).unwrap());
        assert_eq!(summary.archives_found, 2);
        assert_eq!(summary.archives_failed, 1);
        assert_eq!(summary.games_ingested, 12);

        let bad = summary
            .archives
            .iter()
            .find(|r| r.archive.ends_with("bad.pgn.zst"))
            .unwrap();
        assert!(bad.error.is_some());
        assert_eq!(bad.games, 0);
    }

    #[test]
    fn test_truncated_archive_keeps_partial_output() {
        let ws = workspace(1000);
        let path =
            write_zstd_archive(&ws.config.source_dir, "cut.pgn.zst", &numbered_games(20_000, "C00"));
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(b"garbage after the last frame");
        fs::write(&path, bytes).unwrap();

        let summary = completed(run_ingest(&ws.config).unwrap());
        let report = &summary.archives[0];

        assert!(report.error.is_some());
        assert!(report.games > 0);
        assert_eq!(all_rows(&ws.config.output_dir).len() as u64, report.games);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let mut ws = workspace(100);
        ws.config.archive_suffix = ".pgn".to_string();
        let broken = format!(
            "[Event \"{}\"]\n[Result \"0-1\"]\n[WhiteElo \"2000\"]\n[BlackElo \"2100\"]\n[ECO \"Z99\"]\n\n1. d4 0-1\n\n",
            "x".repeat(200_000)
        );
        let pgn = format!(
            "{}{}{}[Event \"Broken\"]\n\n1. e4 {{ never closed\n",
            game("1-0", "1500", "1400", "C00"),
            broken,
            game("0-1", "1600", "1500", "B01"),
        );
        fs::write(ws.config.source_dir.join("plain.pgn"), pgn).unwrap();

        let summary = completed(run_ingest(&ws.config).unwrap());
        assert_eq!(summary.archives_failed, 0);
        assert_eq!(summary.games_ingested, 2);

        let codes: Vec<String> = all_rows(&ws.config.output_dir)
            .into_iter()
            .map(|r| r.opening_code)
            .collect();
        assert_eq!(codes, vec!["C00", "B01"]);
    }

    #[test]
    fn test_unusable_output_dir_is_reported_per_archive() {
        let ws = workspace(100);
        write_zstd_archive(&ws.config.source_dir, "a.pgn.zst", &numbered_games(3, "A00"));
        write_zstd_archive(&ws.config.source_dir, "b.pgn.zst", &numbered_games(3, "B00"));
        fs::write(&ws.config.output_dir, b"a file where the directory should be").unwrap();

        let summary = completed(run_ingest(&ws.config).unwrap());
        assert_eq!(summary.archives_found, 2);
        assert_eq!(summary.archives_failed, 2);
        assert_eq!(summary.games_ingested, 0);
        assert!(summary.archives.iter().all(|r| r.error.is_some()));
        assert!(ws.config.output_dir.is_file());
    }

    #[test]
    fn test_output_dir_around_archives_is_rejected() {
        let mut ws = workspace(10);
        write_zstd_archive(&ws.config.source_dir, "jan.pgn.zst", &numbered_games(3, "A00"));
        ws.config.output_dir = ws.config.source_dir.parent().unwrap().to_path_buf();

        assert!(matches!(
            run_ingest(&ws.config),
            Err(Error::InvalidConfig(_))
        ));
        assert!(ws.config.source_dir.join("jan.pgn.zst").exists());
    }

    #[test]
    fn test_max_games_is_a_per_archive_ceiling() {
        let mut ws = workspace(5);
        ws.config.max_games = Some(12);
        write_zstd_archive(&ws.config.source_dir, "a.pgn.zst", &numbered_games(30, "A00"));
        write_zstd_archive(&ws.config.source_dir, "b.pgn.zst", &numbered_games(30, "B00"));

        let summary = completed(run_ingest(&ws.config).unwrap());
        assert!(summary.archives.iter().all(|r| r.games == 12));
        assert_eq!(summary.games_ingested, 24);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut ws = workspace(10);
        ws.config.workers = 0;
        assert!(matches!(
            run_ingest(&ws.config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reset_output_dir_creates_missing_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("nested/raw");
        reset_output_dir(&dir);
        assert!(dir.is_dir());
    }
}
