/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down and no longer accepts connections.
    #[error("transport is shut down")]
    Closed,

    /// The peer announced a frame larger than we are willing to buffer.
    ///
    /// This is a protocol violation: the connection must be dropped
    /// because the stream position is no longer trustworthy.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Length announced by the prefix.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An outgoing payload does not fit the 4-byte length prefix or the
    /// configured limit.
    #[error("outgoing frame of {0} bytes is too large")]
    PayloadTooLarge(usize),
}
