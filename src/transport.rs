//! Transport layer for the line protocol
//!
//! This module provides:
//! - The [`Acceptor`] / [`Connection`] abstraction over stream transports
//! - Newline framing for inbound lines with a length cap, decoded lossily
//! - The per-session [`Outbox`] and the writer task that drains it

use std::fmt;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec,
};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// Unique identifier for an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bidirectional byte stream carrying one client
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Source of incoming connections
#[async_trait]
pub trait Acceptor: Send {
    type Conn: Connection;

    /// Wait for the next connection and its printable peer address
    async fn accept(&mut self) -> io::Result<(Self::Conn, String)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Acceptor for TcpListener {
    type Conn = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, String)> {
        let (stream, peer) = TcpListener::accept(self).await?;
        stream.set_nodelay(true)?;
        Ok((stream, peer.to_string()))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Sending side of a session's outbound line queue
///
/// Sends never block on the peer's socket; the session's writer task does
/// the I/O. Once that task has exited every send fails with
/// `ConnectionLost`.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send_line(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .send(line.into())
            .map_err(|_| ChatError::connection_lost("outbound channel closed"))
    }

    pub fn send_lines<I, S>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.send_line(line)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Inbound framing: one raw byte chunk per newline-terminated line
///
/// Lines are framed as bytes so that input which is not valid UTF-8 reaches
/// [`read_line`] instead of poisoning the stream.
pub type LineReader<R> = FramedRead<R, AnyDelimiterCodec>;

pub fn line_reader<R: AsyncRead>(reader: R, max_line_length: usize) -> LineReader<R> {
    let codec =
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_line_length);
    FramedRead::new(reader, codec)
}

/// Result of reading one inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A line with its CR/LF terminator removed
    Line(String),
    /// The peer closed its side of the stream
    Closed,
    /// The line exceeded the configured maximum; the stream is unusable
    TooLong,
}

/// Read the next line. Transport failures become `ConnectionLost`.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD.
pub async fn read_line<R>(reader: &mut LineReader<R>) -> Result<Inbound>
where
    R: AsyncRead + Unpin,
{
    match reader.next().await {
        Some(Ok(chunk)) => {
            let line = String::from_utf8_lossy(&chunk);
            Ok(Inbound::Line(line.trim_end_matches(['\r', '\n']).to_string()))
        }
        Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => Ok(Inbound::TooLong),
        Some(Err(e @ AnyDelimiterCodecError::Io(_))) => Err(e.into()),
        None => Ok(Inbound::Closed),
    }
}

/// Spawn the task that writes queued lines to `writer`.
///
/// The task exits when every [`Outbox`] clone has been dropped (after
/// flushing what is queued) or when a write fails, and shuts down the
/// write side of the stream on the way out.
pub fn spawn_writer<W>(
    writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    id: ConnectionId,
) -> JoinHandle<()>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        while let Some(line) = rx.recv().await {
            if let Err(e) = sink.feed(line).await {
                debug!(connection = %id, "write failed: {}", e);
                return;
            }
            while let Ok(more) = rx.try_recv() {
                if let Err(e) = sink.feed(more).await {
                    debug!(connection = %id, "write failed: {}", e);
                    return;
                }
            }
            if let Err(e) = SinkExt::<String>::flush(&mut sink).await {
                debug!(connection = %id, "flush failed: {}", e);
                return;
            }
        }

        if let Err(e) = SinkExt::<String>::close(&mut sink).await {
            trace!(connection = %id, "close failed: {}", e);
        }
        trace!(connection = %id, "writer finished");
    })
}
