//! Communication channels between the two protocol roles.
//!
//! The protocol logic is written against the abstract [`Channel`] trait and
//! never against a concrete transport, so the same code runs over an
//! in-process channel (tests, the session simulator) or a TCP socket (the
//! benchmark binary). Messages are serialized with `bincode`; the typed
//! helpers tag every send and receive with a protocol phase label that is
//! carried into transport errors.
//!
//! Channels also count bytes in both directions. The preprocessing layer
//! reports these counters after each flush, which is where the per-phase
//! communication figures of the benchmark binary come from.

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::trace;

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug)]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    SendError(String),
    /// The message could not be (de-)serialized.
    SerdeError(String),
    /// The message is a Vec, but not of the expected length.
    InvalidLength,
}

/// A communication channel used to send/receive messages to/from the peer.
pub trait Channel {
    /// The error that can occur using the channel.
    type Error: fmt::Debug;

    /// Sends one message (as raw bytes) to the peer.
    #[allow(async_fn_in_trait)]
    async fn send_bytes(&mut self, msg: Vec<u8>) -> Result<(), Self::Error>;

    /// Awaits the next message from the peer.
    #[allow(async_fn_in_trait)]
    async fn recv_bytes(&mut self) -> Result<Vec<u8>, Self::Error>;

    /// Flushes any buffered outgoing data.
    #[allow(async_fn_in_trait)]
    async fn flush(&mut self) -> Result<(), Self::Error>;

    /// Total number of bytes sent over this channel.
    fn bytes_sent(&self) -> u64;

    /// Total number of bytes received over this channel.
    fn bytes_received(&self) -> u64;
}

/// Serializes and sends a protocol message to the peer.
pub(crate) async fn send_to<C: Channel, S: Serialize>(
    channel: &mut C,
    phase: &str,
    msg: &S,
) -> Result<(), Error> {
    let bytes = bincode::serialize(msg).map_err(|e| Error {
        phase: format!("sending {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    channel.send_bytes(bytes).await.map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SendError(format!("{e:?}")),
    })
}

/// Receives and deserializes a protocol message from the peer.
pub(crate) async fn recv_from<C: Channel, T: DeserializeOwned>(
    channel: &mut C,
    phase: &str,
) -> Result<T, Error> {
    let bytes = channel.recv_bytes().await.map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::RecvError(format!("{e:?}")),
    })?;
    bincode::deserialize(&bytes).map_err(|e| Error {
        phase: format!("receiving {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })
}

/// Flushes the channel, mapping transport failures into a phase-labeled
/// error.
pub(crate) async fn flush<C: Channel>(channel: &mut C, phase: &str) -> Result<(), Error> {
    channel.flush().await.map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SendError(format!("{e:?}")),
    })
}

/// Receives a Vec from the peer while checking its length.
pub(crate) async fn recv_vec_from<C: Channel, T: DeserializeOwned>(
    channel: &mut C,
    phase: &str,
    len: usize,
) -> Result<Vec<T>, Error> {
    let v: Vec<T> = recv_from(channel, phase).await?;
    if v.len() == len {
        Ok(v)
    } else {
        Err(Error {
            phase: phase.to_string(),
            reason: ErrorKind::InvalidLength,
        })
    }
}

/// How long a [`SimpleChannel`] waits for a message before giving up.
const RECV_TIMEOUT_SECS: u64 = 10 * 60;

/// An in-process asynchronous channel between the two roles.
#[derive(Debug)]
pub struct SimpleChannel {
    s: Sender<Vec<u8>>,
    r: Receiver<Vec<u8>>,
    bytes_sent: u64,
    bytes_received: u64,
}

impl SimpleChannel {
    /// Creates a connected pair of channels, one per role.
    pub fn pair() -> (Self, Self) {
        let buffer_capacity = 1024;
        let (send_a_to_b, recv_a_to_b) = channel(buffer_capacity);
        let (send_b_to_a, recv_b_to_a) = channel(buffer_capacity);
        let a = SimpleChannel {
            s: send_a_to_b,
            r: recv_b_to_a,
            bytes_sent: 0,
            bytes_received: 0,
        };
        let b = SimpleChannel {
            s: send_b_to_a,
            r: recv_a_to_b,
            bytes_sent: 0,
            bytes_received: 0,
        };
        (a, b)
    }
}

/// The error raised by [`SimpleChannel`] operations.
#[derive(Debug)]
pub enum SimpleChannelError {
    /// The channel has been closed.
    Closed,
    /// No message was received before the timeout.
    TimeoutElapsed,
}

impl Channel for SimpleChannel {
    type Error = SimpleChannelError;

    async fn send_bytes(&mut self, msg: Vec<u8>) -> Result<(), SimpleChannelError> {
        self.bytes_sent += msg.len() as u64;
        trace!(bytes = msg.len(), "sending msg");
        self.s
            .send(msg)
            .await
            .map_err(|_| SimpleChannelError::Closed)
    }

    async fn recv_bytes(&mut self) -> Result<Vec<u8>, SimpleChannelError> {
        let timeout = std::time::Duration::from_secs(RECV_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, self.r.recv()).await {
            Ok(Some(msg)) => {
                self.bytes_received += msg.len() as u64;
                trace!(bytes = msg.len(), "received msg");
                Ok(msg)
            }
            Ok(None) => Err(SimpleChannelError::Closed),
            Err(_) => Err(SimpleChannelError::TimeoutElapsed),
        }
    }

    async fn flush(&mut self) -> Result<(), SimpleChannelError> {
        Ok(())
    }

    fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

/// A channel over a TCP stream, with length-prefixed frames.
#[derive(Debug)]
pub struct TcpChannel {
    r: OwnedReadHalf,
    w: BufWriter<OwnedWriteHalf>,
    bytes_sent: u64,
    bytes_received: u64,
}

impl TcpChannel {
    /// Connects to a listening peer.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        Ok(Self::from_stream(TcpStream::connect(addr).await?))
    }

    /// Binds to `addr` and waits for the peer to connect.
    pub async fn accept<A: ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (stream, _) = listener.accept().await?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an established TCP stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let (r, w) = stream.into_split();
        TcpChannel {
            r,
            w: BufWriter::new(w),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }
}

impl Channel for TcpChannel {
    type Error = std::io::Error;

    async fn send_bytes(&mut self, msg: Vec<u8>) -> Result<(), std::io::Error> {
        let len = u32::try_from(msg.len())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large"))?;
        self.w.write_all(&len.to_le_bytes()).await?;
        self.w.write_all(&msg).await?;
        // The peer may block on this frame before our next write, so the
        // buffer cannot be held back across messages.
        self.w.flush().await?;
        self.bytes_sent += 4 + msg.len() as u64;
        Ok(())
    }

    async fn recv_bytes(&mut self) -> Result<Vec<u8>, std::io::Error> {
        let mut len = [0u8; 4];
        self.r.read_exact(&mut len).await?;
        let len = u32::from_le_bytes(len) as usize;
        let mut msg = vec![0u8; len];
        self.r.read_exact(&mut msg).await?;
        self.bytes_received += 4 + len as u64;
        Ok(msg)
    }

    async fn flush(&mut self) -> Result<(), std::io::Error> {
        self.w.flush().await
    }

    fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_channel_round_trip() {
        let (mut a, mut b) = SimpleChannel::pair();
        send_to(&mut a, "test", &vec![1u32, 2, 3]).await.unwrap();
        let msg: Vec<u32> = recv_from(&mut b, "test").await.unwrap();
        assert_eq!(msg, vec![1, 2, 3]);
        assert_eq!(a.bytes_sent(), b.bytes_received());
    }

    #[tokio::test]
    async fn length_check_rejects_short_vec() {
        let (mut a, mut b) = SimpleChannel::pair();
        send_to(&mut a, "test", &vec![1u32]).await.unwrap();
        let msg: Result<Vec<u32>, Error> = recv_vec_from(&mut b, "test", 2).await;
        assert!(matches!(
            msg,
            Err(Error {
                reason: ErrorKind::InvalidLength,
                ..
            })
        ));
    }
}
