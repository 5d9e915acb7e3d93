//! # matchhall
//!
//! A multiplayer game lobby: players log in, gather in rooms, and the host
//! starts a match that runs as a separate worker process.
//!
//! The lobby speaks length-prefixed JSON over plain TCP. Every request gets
//! exactly one response; clients poll for room and invitation changes.
//! When a host starts a game, the [`MatchOrchestrator`] unpacks the game's
//! server artifact, launches it on a free port, publishes the endpoint in
//! the room, and records the result the worker prints when it exits.
//!
//! Accounts, the game catalog and match history come from a
//! [`LobbyBackend`]: [`JsonStore`] for a real data directory,
//! [`MemoryStore`] for tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use matchhall::prelude::*;
//!
//! # async fn run() -> Result<(), LobbyError> {
//! let store = Arc::new(JsonStore::open("server_data").await?);
//! let server = LobbyServerBuilder::new()
//!     .bind("0.0.0.0:8888")
//!     .build(store)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod server;

pub use client::LobbyClient;
pub use config::LobbyConfig;
pub use error::LobbyError;
pub use server::{LobbyBackend, LobbyServer, LobbyServerBuilder};

pub use matchhall_orchestrator::{MatchFinished, MatchOrchestrator, OrchestratorConfig};
pub use matchhall_store::{JsonStore, MemoryStore};

/// Convenient re-exports for lobby users.
///
/// ```rust
/// use matchhall::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{LobbyBackend, LobbyClient, LobbyConfig, LobbyError, LobbyServer, LobbyServerBuilder};

    pub use matchhall_orchestrator::{
        HistoryEntry, MatchError, MatchFinished, MatchOrchestrator, MatchOutcome, MatchRecord,
        MatchRecorder, OrchestratorConfig, PlayerResult,
    };
    pub use matchhall_protocol::{Request, Response, ResponseKind, Role, RoomId};
    pub use matchhall_room::{
        Catalog, Endpoint, GameInfo, InvitationView, RoomError, RoomStatus, RoomSummary, RoomView,
        StatusTag,
    };
    pub use matchhall_session::{SessionError, UserStore};
    pub use matchhall_store::{JsonStore, MemoryStore, StoreError};
}
