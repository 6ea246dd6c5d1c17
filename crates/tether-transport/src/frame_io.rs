//! Reading and writing frames on async byte streams.
//!
//! [`read_frame`] and [`write_frame`] are generic over `AsyncRead` /
//! `AsyncWrite`, so the same code drives a `TcpStream` half in production
//! and an in-memory mock in tests.

use std::io;
use std::time::Duration;

use tether_protocol::{Codec, LENGTH_PREFIX_LEN, Message, encode_frame, parse_length_prefix};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use crate::TransportError;

/// What a single [`read_frame`] call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A complete frame arrived and decoded cleanly.
    Message(Message),
    /// Nothing arrived within the timeout. The stream is untouched and
    /// still usable.
    Idle,
    /// The peer closed the stream, either between frames or partway
    /// through one.
    Disconnected,
}

/// Reads one frame from `reader`.
///
/// Waits up to `timeout` for the first byte. If nothing shows up the
/// call returns [`ReadOutcome::Idle`] without consuming anything. Once a
/// frame has started, the rest of the prefix and the payload are read in
/// full, however many reads it takes, each step again bounded by
/// `timeout`.
///
/// # Errors
/// - `ReceiveFailed` for OS errors. A peer that stalls mid-frame for
///   longer than `timeout` yields `ReceiveFailed` with
///   [`io::ErrorKind::TimedOut`]; the stream position is then unknown and
///   the stream should be dropped.
/// - `Protocol` if the prefix is oversized or the payload doesn't decode.
pub async fn read_frame<R, C>(
    reader: &mut R,
    codec: &C,
    timeout: Duration,
) -> Result<ReadOutcome, TransportError>
where
    R: AsyncRead + Unpin,
    C: Codec,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];

    let filled = match time::timeout(timeout, reader.read(&mut prefix)).await {
        Err(_elapsed) => return Ok(ReadOutcome::Idle),
        Ok(Ok(0)) => return Ok(ReadOutcome::Disconnected),
        Ok(Ok(n)) => n,
        Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => return Ok(ReadOutcome::Idle),
        Ok(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
    };

    if !fill(reader, &mut prefix[filled..], timeout).await? {
        return Ok(ReadOutcome::Disconnected);
    }

    let len = parse_length_prefix(prefix)?;
    let mut payload = vec![0u8; len];
    if !fill(reader, &mut payload, timeout).await? {
        tracing::debug!(expected = len, "stream ended mid-payload");
        return Ok(ReadOutcome::Disconnected);
    }

    let message = codec.decode(&payload)?;
    tracing::trace!(bytes = len, "frame read");
    Ok(ReadOutcome::Message(message))
}

/// Encodes `message` as one frame and writes it in full.
///
/// # Errors
/// - `Protocol` if the message can't be encoded or is too large.
/// - `SendFailed` if the write or flush fails.
pub async fn write_frame<W, C>(
    writer: &mut W,
    codec: &C,
    message: &Message,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    C: Codec,
{
    let frame = encode_frame(codec, message)?;
    writer
        .write_all(&frame)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)?;
    tracing::trace!(bytes = frame.len(), "frame written");
    Ok(())
}

/// Fills `buf` completely. `Ok(false)` means the stream hit EOF first.
async fn fill<R>(reader: &mut R, buf: &mut [u8], timeout: Duration) -> Result<bool, TransportError>
where
    R: AsyncRead + Unpin,
{
    if buf.is_empty() {
        return Ok(true);
    }

    match time::timeout(timeout, reader.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(true),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Ok(Err(e)) => Err(TransportError::ReceiveFailed(e)),
        Err(_elapsed) => Err(TransportError::ReceiveFailed(io::Error::new(
            io::ErrorKind::TimedOut,
            "peer stalled mid-frame",
        ))),
    }
}
