use super::types::{ExtractedRow, GameRecord};

pub const DEFAULT_EVENT: &str = "Unknown";
pub const DEFAULT_RESULT: &str = "*";
pub const DEFAULT_OPENING_CODE: &str = "Unknown";
pub const DEFAULT_TERMINATION: &str = "Normal";

/// Elo text to rating. Absent, non-numeric, negative or out-of-range text is 0.
pub fn parse_elo(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok()).unwrap_or(0)
}

/// Maps one decoded game onto the fixed chunk-file row, filling in defaults
/// for missing headers. Never fails.
pub fn extract_row(game: GameRecord) -> ExtractedRow {
    ExtractedRow {
        white_elo: parse_elo(game.white_elo.as_deref()),
        black_elo: parse_elo(game.black_elo.as_deref()),
        event: game.event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        result: game.result.unwrap_or_else(|| DEFAULT_RESULT.to_string()),
        opening_code: game
            .opening_code
            .unwrap_or_else(|| DEFAULT_OPENING_CODE.to_string()),
        termination: game
            .termination
            .unwrap_or_else(|| DEFAULT_TERMINATION.to_string()),
    }
}
