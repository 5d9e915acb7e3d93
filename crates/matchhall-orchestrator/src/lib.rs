//! Match orchestration for matchhall.
//!
//! Once a host starts a room, [`MatchOrchestrator`] takes over: it unpacks
//! the game's versioned artifact, picks a port, launches the external match
//! worker and, in a detached task, waits for it to exit, recovers the
//! `GAME_RESULT:` line, records the outcome and returns the room to
//! WAITING.
//!
//! The worker contract is small: it is run as
//! `launch... --port P --player_count N --players p1 p2 ...` inside the
//! unpacked artifact directory and prints one result line before exiting.

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod launch;
mod orchestrator;
mod outcome;
mod recorder;

pub use config::OrchestratorConfig;
pub use error::MatchError;
pub use launch::ensure_unpacked;
pub use orchestrator::{MatchFinished, MatchOrchestrator, MatchProcess, RoomInspection};
pub use outcome::{MatchOutcome, RESULT_SENTINEL, parse_outcome};
pub use recorder::{HistoryEntry, MatchRecord, MatchRecorder, PlayerResult};
