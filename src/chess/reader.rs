use super::error::{Error, Result};
use super::types::GameRecord;
use super::visitor::GameVisitor;
use pgn_reader::Reader;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use zstd::stream::read::Decoder as ZstdDecoder;

pub type PgnInput = Box<dyn Read + Send>;

/// A run of malformed records this long means the parser is no longer making
/// progress through the archive.
const MAX_CONSECUTIVE_PARSE_ERRORS: u32 = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionMode {
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn for_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Passes reads through and remembers whether the underlying source ever
/// failed, so parser-level errors can be told apart from I/O and framing errors
/// once both have surfaced through pgn-reader as `io::Error`.
struct SourceProbe<R> {
    inner: R,
    failed: Arc<AtomicBool>,
}

impl<R: Read> Read for SourceProbe<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|err| {
            if err.kind() != io::ErrorKind::Interrupted {
                self.failed.store(true, Ordering::Relaxed);
            }
        })
    }
}

fn open_input_stream(path: &Path, compression: CompressionMode) -> Result<PgnInput> {
    let archive_error = |source| Error::ArchiveIo {
        archive: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(archive_error)?;

    // pgn-reader buffers its input itself, so plain files go in unbuffered.
    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(archive_error),
    }
}

/// Lazy, forward-only sequence of game records decoded from one archive.
///
/// Yields `Err(Error::RecordParse)` for a malformed record and keeps going;
/// yields `Err(Error::ArchiveIo)` once for an unreadable or corrupt archive and
/// then terminates.
pub struct RecordStream {
    pgn_reader: Reader<SourceProbe<PgnInput>>,
    visitor: GameVisitor,
    path: PathBuf,
    source_failed: Arc<AtomicBool>,
    next_game_index: u64,
    consecutive_errors: u32,
    finished: bool,
}

impl RecordStream {
    pub fn open(path: &Path) -> Result<Self> {
        let input = open_input_stream(path, CompressionMode::for_path(path))?;
        Ok(Self::from_input(input, path))
    }

    pub fn from_input(input: PgnInput, path: &Path) -> Self {
        let source_failed = Arc::new(AtomicBool::new(false));
        let probe = SourceProbe {
            inner: input,
            failed: Arc::clone(&source_failed),
        };

        Self {
            pgn_reader: Reader::new(probe),
            visitor: GameVisitor::new(),
            path: path.to_path_buf(),
            source_failed,
            next_game_index: 1,
            consecutive_errors: 0,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fail(&mut self, source: io::Error) -> Option<Result<GameRecord>> {
        self.finished = true;
        Some(Err(Error::ArchiveIo {
            archive: self.path.clone(),
            source,
        }))
    }
}

impl Iterator for RecordStream {
    type Item = Result<GameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let game_index = self.next_game_index;
        match self.pgn_reader.read_game(&mut self.visitor) {
            Ok(Some(game)) => {
                self.next_game_index += 1;
                self.consecutive_errors = 0;
                Some(Ok(game))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) if self.source_failed.load(Ordering::Relaxed) => self.fail(err),
            Err(err) => {
                self.next_game_index += 1;
                self.consecutive_errors += 1;
                if self.consecutive_errors >= MAX_CONSECUTIVE_PARSE_ERRORS {
                    return self.fail(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{MAX_CONSECUTIVE_PARSE_ERRORS} consecutive malformed records"),
                    ));
                }
                let parse_error = Error::RecordParse {
                    archive: self.path.clone(),
                    game_index,
                    message: err.to_string(),
                };

                // The parser stops mid-record; drop the rest of it so its
                // remaining tags cannot surface as a game of their own.
                if let Err(skip_err) = self.pgn_reader.skip_game()
                    && self.source_failed.load(Ordering::Relaxed)
                {
                    return self.fail(skip_err);
                }
                Some(Err(parse_error))
            }
        }
    }
}
