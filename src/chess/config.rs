use super::error::{Error, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE_DIR: &str = "data";
pub const DEFAULT_ARCHIVE_SUFFIX: &str = ".pgn.zst";
pub const DEFAULT_OUTPUT_DIR: &str = "data/raw";
pub const DEFAULT_STATS_FILE: &str = "data/processed/stats.parquet";
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Everything one pipeline run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source_dir: PathBuf,
    pub archive_suffix: String,
    pub output_dir: PathBuf,
    pub stats_file: PathBuf,
    /// Per-archive ceiling on well-formed games; `None` reads every archive fully.
    pub max_games: Option<u64>,
    pub chunk_size: usize,
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            archive_suffix: DEFAULT_ARCHIVE_SUFFIX.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            stats_file: PathBuf::from(DEFAULT_STATS_FILE),
            max_games: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("worker count must be at least 1".to_string()));
        }
        if self.archive_suffix.is_empty() {
            return Err(Error::InvalidConfig("archive suffix must not be empty".to_string()));
        }

        // The output directory is wiped at the start of every ingest.
        let output_dir = resolve_path(&self.output_dir);
        if resolve_path(&self.source_dir).starts_with(&output_dir) {
            return Err(Error::InvalidConfig(format!(
                "output directory '{}' must not contain the source directory '{}'",
                self.output_dir.display(),
                self.source_dir.display()
            )));
        }
        if resolve_path(&self.stats_file).starts_with(&output_dir) {
            return Err(Error::InvalidConfig(format!(
                "statistics file '{}' must not live inside the output directory '{}'",
                self.stats_file.display(),
                self.output_dir.display()
            )));
        }
        Ok(())
    }
}

/// Absolute form of `path` with symlinks resolved as far as the path exists,
/// so paths that do not exist yet still compare against ones that do.
fn resolve_path(target: &Path) -> PathBuf {
    let absolute = std::path::absolute(target).unwrap_or_else(|_| target.to_path_buf());

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = fs::canonicalize(existing).unwrap_or_else(|_| existing.to_path_buf());
    resolved.extend(missing.iter().rev());
    resolved
}

/// Command-line flags, each falling back to an environment variable and then
/// to the built-in default.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Directory containing the source archives
    #[arg(long, env = "SOURCE_DIR", default_value = DEFAULT_SOURCE_DIR)]
    pub source_dir: PathBuf,

    /// File name suffix an archive must end with
    #[arg(long = "suffix", env = "ARCHIVE_SUFFIX", default_value = DEFAULT_ARCHIVE_SUFFIX)]
    pub archive_suffix: String,

    /// Directory receiving chunk files (cleared at the start of every ingest)
    #[arg(long, env = "OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Final per-opening statistics table
    #[arg(long, env = "STATS_FILE", default_value = DEFAULT_STATS_FILE)]
    pub stats_file: PathBuf,

    /// Stop each archive after this many games
    #[arg(long, env = "MAX_GAMES")]
    pub max_games: Option<u64>,

    /// Rows buffered per worker before a chunk file is flushed
    #[arg(long, env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Worker threads (defaults to the number of CPU cores)
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,
}

impl ConfigArgs {
    pub fn into_config(self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            source_dir: self.source_dir,
            archive_suffix: self.archive_suffix,
            output_dir: self.output_dir,
            stats_file: self.stats_file,
            max_games: self.max_games,
            chunk_size: self.chunk_size,
            workers: self.workers.unwrap_or_else(num_cpus::get),
        };
        config.validate()?;
        Ok(config)
    }
}
