//! # Cancellation Tokens
//!
//! Explicit parent-to-child cancellation built on a watch channel. One pair
//! serves two roles: the executor-wide running token (cancelled when the
//! executor shuts down) and narrower per-call or per-proxy tokens.
//!
//! ## Invariants
//!
//! - Cancellation is one-way and permanent; a cancelled source never
//!   becomes live again.
//! - Dropping the source counts as cancellation: a token whose source is
//!   gone reports cancelled rather than waiting forever.

use tokio::sync::watch;

/// The owning side of a cancellation pair.
#[derive(Clone)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Derives a token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Signals cancellation to every derived token.
    pub fn cancel(&self) {
        // send_replace never fails even with no live receivers
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// The observing side of a cancellation pair.
///
/// `CancelToken::never()` yields a token that is never cancelled, used as
/// the default for call sites that do not thread a caller token through.
#[derive(Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that never signals cancellation.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
            None => false,
        }
    }

    /// Resolves once the source is cancelled or dropped.
    ///
    /// Pends forever on a `never()` token.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Source dropped without an explicit cancel; treat as cancelled.
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rx {
            Some(_) => write!(f, "CancelToken(cancelled: {})", self.is_cancelled()),
            None => write!(f, "CancelToken(never)"),
        }
    }
}
