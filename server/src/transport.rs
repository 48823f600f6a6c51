//! Duplex message-channel boundary between sessions and the outside world.
//!
//! The session layer never touches sockets directly: it consumes an
//! already-established pair of [`MessageStream`] / [`MessageSink`] trait
//! objects, one envelope per frame. How a raw connection becomes such a pair
//! is the transport adapter's business; this module ships a newline-delimited
//! JSON framing over any `AsyncRead`/`AsyncWrite`, which covers real TCP
//! sockets and in-memory duplex pipes alike.

use async_trait::async_trait;
use shared::Envelope;
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

/// Transport failures, classified so the session can log the close reason.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection cleanly.
    #[error("connection closed by peer")]
    Closed,
    /// The connection was torn down without a clean close.
    #[error("connection reset")]
    Reset,
    /// A read or write deadline elapsed.
    #[error("network timeout")]
    Timeout,
    /// The outer frame was not a valid envelope.
    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),
    /// Any other I/O failure.
    #[error("transport error: {0}")]
    Io(std::io::Error),
}

impl TransportError {
    fn from_io(err: std::io::Error) -> TransportError {
        match err.kind() {
            ErrorKind::UnexpectedEof => TransportError::Closed,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                TransportError::Reset
            }
            ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout,
            _ => TransportError::Io(err),
        }
    }
}

/// Inbound half of a session's duplex channel.
#[async_trait]
pub trait MessageStream: Send {
    /// Waits for the next inbound envelope.
    async fn recv(&mut self) -> Result<Envelope, TransportError>;
}

/// Outbound half of a session's duplex channel.
///
/// Implementations are not required to tolerate concurrent senders; the
/// session serializes all writes behind its own lock.
#[async_trait]
pub trait MessageSink: Send {
    /// Writes one envelope as a single frame.
    async fn send(&mut self, envelope: Envelope) -> Result<(), TransportError>;

    /// Flushes and closes the outbound side.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Reads newline-delimited JSON envelopes from any buffered byte stream.
pub struct JsonFrameStream<R> {
    reader: R,
}

#[async_trait]
impl<R: tokio::io::AsyncBufRead + Unpin + Send> MessageStream for JsonFrameStream<R> {
    async fn recv(&mut self) -> Result<Envelope, TransportError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(TransportError::from_io)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            if line.trim().is_empty() {
                continue;
            }
            return Ok(serde_json::from_str(&line)?);
        }
    }
}

/// Writes newline-delimited JSON envelopes to any byte sink.
pub struct JsonFrameSink<W> {
    writer: W,
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageSink for JsonFrameSink<W> {
    async fn send(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        let mut frame = serde_json::to_vec(&envelope)?;
        frame.push(b'\n');
        self.writer
            .write_all(&frame)
            .await
            .map_err(TransportError::from_io)?;
        self.writer.flush().await.map_err(TransportError::from_io)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await.map_err(TransportError::from_io)
    }
}

/// Splits an established duplex byte stream into framed message halves.
pub fn framed<S>(
    stream: S,
) -> (
    JsonFrameStream<BufReader<ReadHalf<S>>>,
    JsonFrameSink<WriteHalf<S>>,
)
where
    S: AsyncRead + AsyncWrite + Send,
{
    let (read_half, write_half) = tokio::io::split(stream);
    (
        JsonFrameStream {
            reader: BufReader::new(read_half),
        },
        JsonFrameSink { writer: write_half },
    )
}
