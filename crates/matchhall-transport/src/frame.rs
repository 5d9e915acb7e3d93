//! Length-prefixed framing over any async byte stream.
//!
//! Every frame on the wire is:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ len: u32, big-endian │ payload: exactly len bytes│
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! The framing layer knows nothing about what the payload means. It only
//! answers three questions: did a whole frame arrive, did the stream end,
//! or did the peer break the rules (a hostile length prefix).

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Default upper bound for a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads one frame.
///
/// Returns `Ok(None)` when the stream ends before a complete frame
/// arrived, whether that happens before the prefix or halfway through
/// the payload. Both count as a clean disconnect.
///
/// # Errors
/// - [`TransportError::FrameTooLarge`] if the prefix exceeds `max_len`.
///   Nothing is allocated for the payload in that case.
/// - [`TransportError::ReceiveFailed`] for any other I/O failure.
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::ReceiveFailed(e)),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(TransportError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(TransportError::ReceiveFailed(e)),
    }
}

/// Writes one frame and flushes the writer.
///
/// # Errors
/// - [`TransportError::PayloadTooLarge`] if `payload` exceeds `max_len`
///   or cannot be described by a `u32` prefix.
/// - [`TransportError::SendFailed`] if the write fails.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_len: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_len {
        return Err(TransportError::PayloadTooLarge(payload.len()));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::PayloadTooLarge(payload.len()))?;

    // One buffer, one write: a frame is never interleaved with another
    // writer's bytes even if the caller forgets to serialize sends.
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);

    writer
        .write_all(&buf)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}
