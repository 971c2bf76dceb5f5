use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no archives matching '*{suffix}' in '{}'", .dir.display())]
    NoArchives { dir: PathBuf, suffix: String },

    #[error("no chunk files in '{}'", .dir.display())]
    NoChunks { dir: PathBuf },

    #[error("archive '{}': {source}", .archive.display())]
    ArchiveIo {
        archive: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive '{}': malformed record at game_index={game_index}: {message}", .archive.display())]
    RecordParse {
        archive: PathBuf,
        game_index: u64,
        message: String,
    },

    #[error("output '{}': {source}", .path.display())]
    OutputIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("chunk file '{}' already exists", .path.display())]
    ChunkExists { path: PathBuf },

    #[error("duckdb: {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: duckdb::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Glob(#[from] glob::PatternError),
}

impl Error {
    pub(crate) fn output(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::OutputIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn database(context: impl Into<String>, source: duckdb::Error) -> Self {
        Self::Database {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
