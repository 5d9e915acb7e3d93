//! Reference collaborators for matchhall.
//!
//! The lobby needs three things from the outside world: accounts
//! ([`UserStore`](matchhall_session::UserStore)), a game catalog
//! ([`Catalog`](matchhall_room::Catalog)) and somewhere to put finished
//! matches ([`MatchRecorder`](matchhall_orchestrator::MatchRecorder)).
//! This crate provides two implementations of all three:
//!
//! - [`JsonStore`]: `users.json` / `games.json` files plus an
//!   `uploaded_games/` artifact tree under one data directory.
//! - [`MemoryStore`]: everything in memory, for tests and demos.

mod error;
mod json;
mod memory;

pub use error::StoreError;
pub use json::JsonStore;
pub use memory::MemoryStore;

/// Timestamp format used in history entries.
pub(crate) fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
