//! Persistence hook for finished matches.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::MatchError;

/// One finished match, as handed to the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub game: String,
    /// Everyone rostered at launch, including players who left mid-match.
    pub players: Vec<String>,
    /// `None` for a declared draw.
    pub winner: Option<String>,
}

/// A match from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayerResult {
    Win,
    Lose,
    Draw,
}

impl PlayerResult {
    /// The result for `player` given the match's winner.
    pub fn for_player(player: &str, winner: Option<&str>) -> Self {
        match winner {
            None => Self::Draw,
            Some(w) if w == player => Self::Win,
            Some(_) => Self::Lose,
        }
    }
}

/// One entry of a player's match history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub game: String,
    pub timestamp: String,
    pub players: Vec<String>,
    pub winner: Option<String>,
    pub result: PlayerResult,
}

/// Stores finished matches and serves per-player history.
pub trait MatchRecorder: Send + Sync + 'static {
    /// Persists `record` for every rostered player.
    ///
    /// # Errors
    /// [`MatchError::Record`] if the record could not be written.
    fn record_match(
        &self,
        record: &MatchRecord,
    ) -> impl Future<Output = Result<(), MatchError>> + Send;

    /// `identity`'s history, oldest first. Unknown identities have none.
    fn history(&self, identity: &str) -> impl Future<Output = Vec<HistoryEntry>> + Send;
}
