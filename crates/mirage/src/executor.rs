//! # Executor
//!
//! Owns the connection to the remote host process. The executor spawns a
//! background pump that continuously reads from the transport and routes
//! replies to the appropriate pending request by sequence number.
//!
//! The executor also owns the two generators every proxy depends on: the
//! reply sequence counter and the monotone instance-id counter. Both are
//! scoped to this executor, so proxies sharing one executor owner may
//! invoke concurrently and still demultiplex cleanly.
//!
//! ## Invariants
//!
//! - Every outgoing request is tagged with its instance id.
//! - Pump termination (closed or failed transport) fails all pending
//!   requests and cancels the running token, so derived proxies observe
//!   shutdown without any local dispose call.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::cancel::CancelSource;
use crate::cancel::CancelToken;
use crate::message;
use crate::message::Envelope;
use crate::message::Fault;
use crate::message::InstanceId;
use crate::message::Reply;
use crate::message::Request;
use crate::transport;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Error {
    Transport(transport::Error),
    Codec(message::Error),
    /// The remote side reported a failure for this request.
    Remote(Fault),
    /// The caller's cancellation token fired before completion.
    Cancelled,
    /// The executor is shut down; no further requests can be issued.
    Shutdown,
    /// No reply arrived within the invocation deadline.
    Timeout,
    /// The pump dropped the reply channel before answering.
    ChannelClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
            Self::Remote(fault) => write!(f, "Remote failure: {}", fault),
            Self::Cancelled => write!(f, "Request cancelled"),
            Self::Shutdown => write!(f, "Executor is shut down"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::ChannelClosed => write!(f, "Reply channel closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<message::Error> for Error {
    fn from(e: message::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

const INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply routing slot for one outstanding request.
type PendingReply = oneshot::Sender<Result<Vec<u8>>>;

/// Connection owner and message demultiplexer for one remote host process.
pub struct Executor {
    transport: Arc<dyn Transport>,
    pending: Arc<DashMap<u64, PendingReply>>,
    seq_gen: AtomicU64,
    instance_id_gen: AtomicU64,
    running: CancelSource,
}

impl Executor {
    /// Creates an executor over the transport and spawns its pump task.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        let executor = Arc::new(Self {
            transport: transport.clone(),
            pending: Arc::new(DashMap::new()),
            seq_gen: AtomicU64::new(1),
            instance_id_gen: AtomicU64::new(1),
            running: CancelSource::new(),
        });

        let pump_pending = executor.pending.clone();
        let pump_running = executor.running.clone();
        let pump_stop = executor.running.token();

        tokio::spawn(async move {
            let error = loop {
                tokio::select! {
                    received = transport.recv() => match received {
                        Ok(Some(payload)) => {
                            if let Err(e) = Self::route_reply(&payload, &pump_pending) {
                                warn!(error = %e, "pump failed to route inbound frame");
                                break e;
                            }
                        }
                        Ok(None) => {
                            break Error::Transport(transport::Error::ConnectionLost(
                                "Stream closed".into(),
                            ));
                        }
                        Err(e) => {
                            warn!(error = %e, "transport failure in pump");
                            break Error::Transport(e);
                        }
                    },
                    _ = pump_stop.cancelled() => break Error::Shutdown,
                }
            };

            Self::fail_all_pending(&pump_pending, error);
            // A dead connection is indistinguishable from shutdown for the
            // proxies derived from this executor.
            pump_running.cancel();
        });

        executor
    }

    /// The executor-wide running token. Cancelled exactly once, on shutdown
    /// or pump failure, and observed by every proxy built against this
    /// executor.
    pub fn running_token(&self) -> CancelToken {
        self.running.token()
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_cancelled()
    }

    /// Allocates the next instance id. Monotone within this executor.
    pub fn next_instance_id(&self) -> InstanceId {
        InstanceId(self.instance_id_gen.fetch_add(1, Ordering::Relaxed))
    }

    /// Cancels the running token and stops the pump. Idempotent.
    ///
    /// Called by the executor owner when the last holder disposes.
    pub fn shutdown(&self) {
        debug!("executor shutting down");
        self.running.cancel();
    }

    /// Sends a creation request and awaits its acknowledgement.
    pub async fn create_object_instance(
        &self,
        instance_id: InstanceId,
        pack: Vec<u8>,
        cancel: &CancelToken,
    ) -> Result<()> {
        debug!(%instance_id, "creating remote object instance");
        self.request(cancel, |seq| Request::CreateObjectInstance {
            instance_id,
            seq,
            pack,
        })
        .await
        .map(|_ack| ())
    }

    /// Sends an invocation addressed by instance id and awaits the result
    /// pack.
    pub async fn invoke_method(
        &self,
        instance_id: InstanceId,
        method: &str,
        pack: Vec<u8>,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        trace!(%instance_id, method, "forwarding invocation");
        self.request(cancel, |seq| Request::InvokeMethod {
            instance_id,
            seq,
            method: method.to_string(),
            pack,
        })
        .await
    }

    /// Sends the advisory disposal notice for an instance id.
    ///
    /// Fire and forget: no reply is awaited and failures are only logged.
    /// Outside a runtime context (teardown on a foreign thread) the notice
    /// is skipped; the remote host reclaims the object when the connection
    /// drops.
    pub fn notify_dispose(&self, instance_id: InstanceId) {
        if self.running.is_cancelled() {
            return;
        }
        let envelope = Envelope::Request(Request::DisposeObjectInstance { instance_id });
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%instance_id, error = %e, "failed to encode dispose notice");
                return;
            }
        };
        let transport = self.transport.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            trace!(%instance_id, "no runtime available, skipping dispose notice");
            return;
        };
        handle.spawn(async move {
            if let Err(e) = transport.send(&payload).await {
                debug!(%instance_id, error = %e, "dispose notice not delivered");
            }
        });
    }

    /// Registers a pending reply, sends the request, and awaits the
    /// correlated reply, racing the caller's cancellation token.
    async fn request(
        &self,
        cancel: &CancelToken,
        build: impl FnOnce(u64) -> Request,
    ) -> Result<Vec<u8>> {
        if self.running.is_cancelled() {
            return Err(Error::Shutdown);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, tx);

        let payload = match Envelope::Request(build(seq)).encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(&seq);
                return Err(e.into());
            }
        };
        if let Err(e) = self.transport.send(&payload).await {
            self.pending.remove(&seq);
            return Err(e.into());
        }

        tokio::select! {
            outcome = tokio::time::timeout(INVOKE_TIMEOUT, rx) => match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => {
                    self.pending.remove(&seq);
                    Err(Error::ChannelClosed)
                }
                Err(_) => {
                    self.pending.remove(&seq);
                    Err(Error::Timeout)
                }
            },
            _ = cancel.cancelled() => {
                self.pending.remove(&seq);
                Err(Error::Cancelled)
            }
        }
    }

    /// Routes one inbound frame to its pending request.
    fn route_reply(payload: &[u8], pending: &DashMap<u64, PendingReply>) -> Result<()> {
        let envelope = Envelope::decode(payload)?;
        let Envelope::Reply(Reply { seq, status }) = envelope else {
            return Err(Error::Codec(message::Error::Decode(
                "Pump received Request frame instead of Reply".into(),
            )));
        };

        // No pending slot means a late or duplicate reply; drop it.
        let Some((_, tx)) = pending.remove(&seq) else {
            trace!(seq, "dropping uncorrelated reply");
            return Ok(());
        };

        let result = status.map_err(Error::Remote);
        let _ = tx.send(result);
        Ok(())
    }

    /// Fails every outstanding request with the given error.
    fn fail_all_pending(pending: &DashMap<u64, PendingReply>, error: Error) {
        let seqs: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
        for seq in seqs {
            if let Some((_, tx)) = pending.remove(&seq) {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }
}
