//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes to and from the remote host
//! process.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The transport knows nothing about envelopes,
//!   instance ids, or parameter packs. It moves opaque buffers.
//! - **Activation-Agnostic**: How the remote process is launched (and when
//!   the connection is established) is the activator's concern, not ours.

use std::fmt;

/// Errors that occur at the transport layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The remote host process is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The operation timed out before completing.
    Timeout,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Timeout => write!(f, "Transport operation timed out"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A duplex byte channel to the remote host process.
///
/// Object-safe (`Arc<dyn Transport>`) so an executor can hold any
/// implementation. Replies are not correlated here; the executor's pump
/// matches them to outstanding requests by sequence number.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one encoded envelope.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next inbound envelope.
    ///
    /// Returns `Ok(None)` once the stream is closed. Must not interpret
    /// payload contents.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
