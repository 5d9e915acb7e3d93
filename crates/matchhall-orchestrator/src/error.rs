//! Error types for match orchestration.

use matchhall_room::RoomError;

/// Errors returned to the host's `start_game` call.
///
/// Anything that fails before the worker is running leaves the room
/// WAITING with no process registered.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The room-level guards failed (not host, not waiting, ...).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The catalog has no launch command for this game.
    #[error("Server command not defined.")]
    NoLaunchCommand(String),

    /// No archive for the room's pinned version.
    #[error("Game file for version {version} not found.")]
    ArtifactMissing { game: String, version: String },

    /// The archive exists but could not be unpacked.
    #[error("Failed to extract server files: {0}")]
    Unpack(String),

    /// The OS would not hand out an ephemeral port.
    #[error("No free port available: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// The worker process could not be started.
    #[error("Failed to start process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The recorder rejected a finished match. Only logged, never returned
    /// to a client.
    #[error("failed to record match: {0}")]
    Record(String),
}
