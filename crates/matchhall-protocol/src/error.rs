//! Error types for the protocol layer.
//!
//! A `ProtocolError` means the problem is in how a payload is shaped,
//! not in networking or in room/session state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The payload is not a valid request/response record.
    ///
    /// On the server side this is unrecoverable for the connection:
    /// the peer is not speaking the protocol.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The `action` field names something the server does not handle.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The action is known but its `data` record is missing fields or
    /// has fields of the wrong type.
    #[error("Invalid data for '{action}': {source}")]
    InvalidData {
        /// The action whose data failed to parse.
        action: String,
        /// What serde objected to.
        #[source]
        source: serde_json::Error,
    },
}
