//! Error types for the room layer.

use matchhall_protocol::RoomId;

/// Errors that can occur during room operations.
///
/// Every variant is a recoverable state error: the handler turns it into a
/// `success: false` response using the `Display` text as the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The caller is already a member of some room.
    #[error("Already in a room.")]
    AlreadyInRoom(RoomId),

    /// The room does not exist (never did, or was deleted when it emptied).
    #[error("Room not found.")]
    RoomNotFound(RoomId),

    /// `|members| == max_players`.
    #[error("Room is full.")]
    RoomFull(RoomId),

    /// The room is PLAYING; joins and starts need WAITING.
    #[error("Game already started.")]
    RoomNotWaiting(RoomId),

    /// A host-only operation from a non-host.
    #[error("Only host can {action}.")]
    NotHost { action: &'static str },

    /// The caller is not in any room (or not in the room named).
    #[error("Not in a room.")]
    NotInRoom,

    /// The offered version differs from the catalog's (create) or the
    /// room's pinned version (join).
    #[error("Version mismatch. Required: {expected}, yours: {actual}.")]
    VersionMismatch { expected: String, actual: String },

    /// The catalog has no such game.
    #[error("Game not found.")]
    GameNotFound(String),
}
