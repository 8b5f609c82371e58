//! Newline-delimited JSON over TCP.
//!
//! A [`Connection`] splits into a [`MessageSink`] (fire-and-forget sends via
//! a writer task) and a [`MessageStream`] of decoded inbound messages.

use std::net::SocketAddr;

use derive_more::{Display, Error, From};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::net::protocol::PeerMessage;
use crate::net::session::Role;

#[derive(Debug, Display, Error, From)]
pub enum TransportError {
    #[display("i/o error: {_0}")]
    Io(std::io::Error),
    #[display("malformed message: {_0}")]
    Codec(serde_json::Error),
}

impl TransportError {
    /// A bad line leaves the connection usable; an i/o error does not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Io(_))
    }
}

pub fn encode(msg: &PeerMessage) -> Result<String, TransportError> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

pub fn decode(line: &str) -> Result<PeerMessage, TransportError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// An open link to the peer.
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    role: Role,
}

impl Connection {
    /// Dial the peer. The dialing side hosts.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        tracing::info!(%peer_addr, "connected to peer");
        Ok(Self { stream, peer_addr, role: Role::Host })
    }

    /// Take the next inbound connection. The accepting side joins.
    pub async fn accept(listener: &TcpListener) -> Result<Self, TransportError> {
        let (stream, peer_addr) = listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::info!(%peer_addr, "accepted peer");
        Ok(Self { stream, peer_addr, role: Role::Joiner })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Role implied by who dialed whom.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn into_parts(self) -> (MessageSink, MessageStream) {
        let (read, write) = self.stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(write, rx));
        let lines = LinesStream::new(BufReader::new(read).lines());
        (MessageSink { tx, writer }, MessageStream { lines })
    }
}

/// Two peers dialed each other at the same moment: keep exactly one link.
///
/// The side whose own address sorts first keeps its outbound connection and
/// hosts; the other keeps the inbound one and joins. Both sides compute the
/// same answer from the same pair of addresses.
pub fn resolve_simultaneous(
    local_addr: &str,
    peer_addr: &str,
    outbound: Connection,
    inbound: Connection,
) -> Connection {
    if local_addr < peer_addr {
        tracing::info!(local_addr, peer_addr, "simultaneous connect: keeping outbound link");
        outbound
    } else {
        tracing::info!(local_addr, peer_addr, "simultaneous connect: keeping inbound link");
        inbound
    }
}

async fn write_loop(mut write: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<PeerMessage>) {
    while let Some(msg) = rx.recv().await {
        let line = match encode(&msg) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, kind = msg.kind(), "could not encode message");
                continue;
            }
        };
        if let Err(e) = write.write_all(line.as_bytes()).await {
            tracing::warn!(error = %e, "peer write failed, closing writer");
            return;
        }
    }
    let _ = write.shutdown().await;
}

pub struct MessageSink {
    tx: mpsc::UnboundedSender<PeerMessage>,
    writer: JoinHandle<()>,
}

impl MessageSink {
    /// Queue a message. Returns false once the writer has stopped.
    pub fn send(&self, msg: PeerMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Flush everything queued and close our side of the link.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.writer.await {
            tracing::warn!(error = %e, "writer task ended abnormally");
        }
    }
}

pub struct MessageStream {
    lines: LinesStream<BufReader<OwnedReadHalf>>,
}

impl MessageStream {
    /// Next message; `None` when the peer closed the link. Blank lines are
    /// skipped.
    pub async fn next(&mut self) -> Option<Result<PeerMessage, TransportError>> {
        while let Some(line) = self.lines.next().await {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(decode(&line)),
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}
