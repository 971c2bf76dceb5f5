use super::error::Result;
use log::warn;
use std::path::{Path, PathBuf};

/// Lists the archives in `dir` whose file name ends with `suffix`, sorted
/// lexicographically by path. An empty result is not an error.
pub fn locate_archives(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    // The directory part is matched literally, only the file name is a pattern.
    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(suffix)
    );

    let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("Skipping unreadable directory entry: {}", err);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();

    paths.sort();
    Ok(paths)
}
