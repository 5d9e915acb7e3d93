//! Recovering a match's outcome from the worker's standard output.
//!
//! A worker reports its result by printing one line:
//!
//! ```text
//! GAME_RESULT: {"winner": "bob", "players": ["alice", "bob"]}
//! ```
//!
//! The payload must carry a `winner` field; `null` or `""` declares no
//! winner, and such a match is not written to history. If several valid lines appear, the last one counts. Lines that
//! start with the sentinel but don't parse are logged and skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of the result line.
pub const RESULT_SENTINEL: &str = "GAME_RESULT:";

/// What a worker declared when it finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// `None` when the worker declared no winner.
    pub winner: Option<String>,
    /// The worker's own player list; informational only.
    #[serde(default)]
    pub players: Vec<String>,
}

/// Scans a worker's full standard output for its result line.
///
/// Returns `None` when no valid line is present (crash, abnormal exit).
pub fn parse_outcome(stdout: &str) -> Option<MatchOutcome> {
    stdout.lines().filter_map(parse_line).last()
}

fn parse_line(line: &str) -> Option<MatchOutcome> {
    let payload = line.trim_end_matches('\r').strip_prefix(RESULT_SENTINEL)?;

    let value: Value = match serde_json::from_str(payload.trim()) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, line, "unparsable result line");
            return None;
        }
    };

    let winner = match value.get("winner") {
        Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
        Some(Value::String(_)) | Some(Value::Null) => None,
        _ => {
            tracing::warn!(line, "result line has no usable winner field");
            return None;
        }
    };

    let players = value
        .get("players")
        .and_then(|p| serde_json::from_value(p.clone()).ok())
        .unwrap_or_default();

    Some(MatchOutcome { winner, players })
}
