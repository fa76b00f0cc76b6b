//! In-memory transports for testing.
//!
//! Used by the test suite and by consumers that want to exercise generated
//! proxies against a scripted host without spawning a real process.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;

/// A duplex channel transport over tokio mpsc channels.
///
/// Bytes sent on one side appear on the other side's `recv` and vice
/// versa, simulating the pipe to a remote host process.
pub struct DuplexTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl DuplexTransport {
    /// Creates a connected pair; one side plays the client, the other the
    /// remote host.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Self {
            tx: tx_a,
            rx: Arc::new(Mutex::new(rx_b)),
        };
        let b = Self {
            tx: tx_b,
            rx: Arc::new(Mutex::new(rx_a)),
        };

        (a, b)
    }
}

#[async_trait::async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| transport::Error::ConnectionLost("Channel closed".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}
