use super::db;
use super::error::{Error, Result};
use super::types::{ArchiveId, ExtractedRow};
use duckdb::{Connection, params};
use log::debug;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const CHUNK_EXTENSION: &str = "parquet";
const CHUNK_TABLE: &str = "chunk_rows";

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static pattern compiles"));

/// Makes an archive stem safe to embed in a chunk file name.
pub fn sanitize_stem(stem: &str) -> String {
    let sanitized = UNSAFE_NAME_CHARS.replace_all(stem, "_");
    if sanitized.is_empty() {
        "archive".to_string()
    } else {
        sanitized.into_owned()
    }
}

/// `{ordinal:04}-{stem}-{seq:05}.parquet`
pub fn chunk_file_name(archive: &ArchiveId, sequence: u32) -> String {
    format!("{archive}-{sequence:05}.{CHUNK_EXTENSION}")
}

/// Flushes batches of rows as immutable Parquet chunk files.
///
/// Each writer owns one DuckDB session and one staging table; a writer is
/// meant to be used by a single worker.
pub struct ChunkWriter {
    conn: Connection,
    output_dir: PathBuf,
}

impl ChunkWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        let conn = db::open_session()?;
        conn.execute_batch(&format!(
            r#"CREATE TABLE {CHUNK_TABLE} (
                "event" VARCHAR NOT NULL,
                "result" VARCHAR NOT NULL,
                "whiteElo" UINTEGER NOT NULL,
                "blackElo" UINTEGER NOT NULL,
                "openingCode" VARCHAR NOT NULL,
                "termination" VARCHAR NOT NULL
            );"#
        ))
        .map_err(|e| Error::database("create chunk staging table", e))?;

        Ok(Self {
            conn,
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn chunk_path(&self, archive: &ArchiveId, sequence: u32) -> PathBuf {
        self.output_dir.join(chunk_file_name(archive, sequence))
    }

    /// Writes `rows` as one new chunk file. An empty batch writes nothing and
    /// returns `Ok(None)`. Never overwrites an existing chunk.
    pub fn write_chunk(
        &self,
        rows: &[ExtractedRow],
        archive: &ArchiveId,
        sequence: u32,
    ) -> Result<Option<PathBuf>> {
        if rows.is_empty() {
            return Ok(None);
        }

        let path = self.chunk_path(archive, sequence);
        if path.exists() {
            return Err(Error::ChunkExists { path });
        }

        let staging = path.with_extension(format!("{CHUNK_EXTENSION}.tmp"));
        let copied = self.stage_rows(rows).and_then(|()| self.copy_to(&staging));
        let cleared = self
            .conn
            .execute_batch(&format!("DELETE FROM {CHUNK_TABLE};"))
            .map_err(|e| Error::database("clear chunk staging table", e));

        if let Err(err) = copied.and(cleared) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }

        fs::rename(&staging, &path).map_err(|e| Error::output(&path, e))?;
        debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(Some(path))
    }

    fn stage_rows(&self, rows: &[ExtractedRow]) -> Result<()> {
        let mut appender = self
            .conn
            .appender(CHUNK_TABLE)
            .map_err(|e| Error::database("open chunk appender", e))?;

        for row in rows {
            appender
                .append_row(params![
                    row.event,
                    row.result,
                    row.white_elo,
                    row.black_elo,
                    row.opening_code,
                    row.termination
                ])
                .map_err(|e| Error::database("append chunk row", e))?;
        }

        appender
            .flush()
            .map_err(|e| Error::database("flush chunk appender", e))
    }

    fn copy_to(&self, staging: &Path) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "COPY {CHUNK_TABLE} TO {} (FORMAT PARQUET);",
                db::quote_path(staging)
            ))
            .map_err(|e| Error::database(format!("write {}", staging.display()), e))
    }
}

/// The set of chunk files currently in an output directory, treated as the
/// partitions of one logical table. Order across partitions carries no meaning.
#[derive(Debug, Clone)]
pub struct ChunkManifest {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl ChunkManifest {
    /// Scans `dir` for chunk files. A missing directory yields an empty manifest.
    pub fn scan(dir: &Path) -> Result<Self> {
        let pattern = format!(
            "{}/*.{CHUNK_EXTENSION}",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let mut files: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `read_parquet([...])` over every partition in the manifest.
    pub fn sql_source(&self) -> String {
        let list = self
            .files
            .iter()
            .map(|path| db::quote_path(path))
            .collect::<Vec<_>>()
            .join(", ");
        format!("read_parquet([{list}])")
    }
}

/// Reads one chunk file back in file order.
pub fn read_chunk(path: &Path) -> Result<Vec<ExtractedRow>> {
    let conn = db::open_session()?;
    let sql = format!(
        r#"SELECT "event", "result", "whiteElo", "blackElo", "openingCode", "termination"
           FROM read_parquet({}, file_row_number = true)
           ORDER BY file_row_number"#,
        db::quote_path(path)
    );
    let context = || format!("read {}", path.display());

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(context(), e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ExtractedRow {
                event: row.get(0)?,
                result: row.get(1)?,
                white_elo: row.get(2)?,
                black_elo: row.get(3)?,
                opening_code: row.get(4)?,
                termination: row.get(5)?,
            })
        })
        .map_err(|e| Error::database(context(), e))?;

    let collected: std::result::Result<Vec<_>, _> = rows.collect();
    collected.map_err(|e| Error::database(context(), e))
}
