//! PGN and archive builders shared by the pipeline tests.

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

pub struct GameHeaders<'a> {
    pub result: &'a str,
    pub white_elo: &'a str,
    pub black_elo: &'a str,
    pub eco: &'a str,
}

pub fn game(result: &str, white_elo: &str, black_elo: &str, eco: &str) -> String {
    pgn(&GameHeaders {
        result,
        white_elo,
        black_elo,
        eco,
    })
}

pub fn pgn(headers: &GameHeaders<'_>) -> String {
    format!(
        "[Event \"Rated Blitz game\"]\n[Result \"{result}\"]\n[WhiteElo \"{white}\"]\n[BlackElo \"{black}\"]\n[ECO \"{eco}\"]\n[Termination \"Normal\"]\n\n1. e4 e5 2. Nf3 Nc6 {result}\n\n",
        result = headers.result,
        white = headers.white_elo,
        black = headers.black_elo,
        eco = headers.eco,
    )
}

/// `count` distinct games; game `i` has white Elo `1000 + i`.
pub fn numbered_games(count: u32, eco: &str) -> String {
    let mut out = String::new();
    for i in 0..count {
        let white = (1000 + i).to_string();
        let _ = write!(out, "{}", game("1-0", &white, "1400", eco));
    }
    out
}

pub fn write_zstd_archive(dir: &Path, name: &str, pgn: &str) -> PathBuf {
    let path = dir.join(name);
    let compressed = zstd::stream::encode_all(pgn.as_bytes(), 1).unwrap();
    fs::write(&path, compressed).unwrap();
    path
}
