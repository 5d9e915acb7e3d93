//! Unified error type for the lobby server.

use matchhall_orchestrator::MatchError;
use matchhall_protocol::ProtocolError;
use matchhall_room::RoomError;
use matchhall_session::SessionError;
use matchhall_store::StoreError;
use matchhall_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically. Every
/// wrapped variant is transparent: its `Display` text is what a client
/// sees in a failure response's `message`.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A transport-level error (accept, send, recv, oversized frame).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed payload, unknown action).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (login, registration).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, version mismatch).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A match launch error.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// A data directory error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A login-only action from a connection with no bound identity.
    #[error("Permission denied. Please log in first.")]
    NotLoggedIn,

    /// The server closed the connection before answering.
    #[error("connection closed by server")]
    ConnectionClosed,
}
