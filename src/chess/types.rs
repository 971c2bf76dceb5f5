use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Header fields of one decoded game, exactly as they appeared in the archive.
/// `None` means the tag was absent (or empty).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecord {
    pub event: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<String>,
    pub black_elo: Option<String>,
    pub opening_code: Option<String>,
    pub termination: Option<String>,
}

/// Fixed-shape row persisted in chunk files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRow {
    pub event: String,
    pub result: String,
    pub white_elo: u32,
    pub black_elo: u32,
    pub opening_code: String,
    pub termination: String,
}

/// One line of the final per-opening statistics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsRow {
    pub opening_code: String,
    pub total_games: u64,
    pub white_win_rate: f64,
    pub avg_white_elo: f64,
}

/// Identity of a source archive within one run: its position in the sorted
/// discovery list plus a filesystem-safe stem of its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveId {
    pub ordinal: usize,
    pub stem: String,
    pub path: PathBuf,
}

impl ArchiveId {
    pub fn new(ordinal: usize, path: &Path, suffix: &str) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.strip_suffix(suffix).unwrap_or(&name);

        Self {
            ordinal,
            stem: super::chunk::sanitize_stem(stem),
            path: path.to_path_buf(),
        }
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{}", self.ordinal, self.stem)
    }
}
