use super::types::GameRecord;
use pgn_reader::{RawTag, Skip, Visitor};
use std::mem;
use std::ops::ControlFlow;

/// Header-only PGN visitor (pgn-reader).
///
/// Collects the six tags the pipeline extracts and ignores everything else,
/// including the movetext: variations are skipped and SAN tokens are never
/// materialised. The collected headers travel through `Tags` and `Movetext`
/// so the visitor itself holds no per-game state.
#[derive(Debug, Default)]
pub struct GameVisitor;

#[derive(Debug, Default)]
pub struct HeaderFields {
    event: String,
    result: String,
    white_elo: String,
    black_elo: String,
    eco: String,
    termination: String,
}

impl HeaderFields {
    fn opt_take(field: &mut String) -> Option<String> {
        if field.is_empty() {
            None
        } else {
            Some(mem::take(field))
        }
    }

    fn set_known_tag(&mut self, key: &[u8], value: RawTag<'_>) {
        let slot: &mut String = match key {
            b"Event" => &mut self.event,
            b"Result" => &mut self.result,
            b"WhiteElo" => &mut self.white_elo,
            b"BlackElo" => &mut self.black_elo,
            b"ECO" => &mut self.eco,
            b"Termination" => &mut self.termination,
            _ => return,
        };

        // First occurrence wins.
        if !slot.is_empty() {
            return;
        }

        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return;
        }

        *slot = String::from_utf8_lossy(bytes).into_owned();
    }

    fn into_record(mut self) -> GameRecord {
        GameRecord {
            event: Self::opt_take(&mut self.event),
            result: Self::opt_take(&mut self.result),
            white_elo: Self::opt_take(&mut self.white_elo),
            black_elo: Self::opt_take(&mut self.black_elo),
            opening_code: Self::opt_take(&mut self.eco),
            termination: Self::opt_take(&mut self.termination),
        }
    }
}

impl GameVisitor {
    pub fn new() -> Self {
        Self
    }
}

impl Visitor for GameVisitor {
    type Tags = HeaderFields;
    type Movetext = HeaderFields;
    type Output = GameRecord;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(HeaderFields::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        tags.set_known_tag(key, value);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(tags)
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        movetext.into_record()
    }
}
