//! # Illusion Shell
//!
//! The runtime half of every generated proxy. A generated illusion type is
//! a pure forwarding surface: it holds no remote state, only an
//! [`IllusionShell`] carrying identity (instance id), the executor owner,
//! and the disposed flag.
//!
//! ## Lifecycle
//!
//! `Active -> Disposed`, terminal and idempotent. The transition is
//! reachable from three places: an explicit [`IllusionShell::dispose`]
//! call, dropping the shell, and cancellation of the executor-wide
//! running token (observed by a watcher task registered at construction).
//! On transition the shell best-effort sends the disposal notice, cancels
//! its private cancellation source, and releases its owner share. Every
//! forwarding call made after the transition fails fast with
//! [`Error::Disposed`].

use std::future::Future;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::debug;

use crate::cancel::CancelSource;
use crate::cancel::CancelToken;
use crate::executor;
use crate::executor::Executor;
use crate::message;
use crate::message::InstanceId;
use crate::owner::ExecutorOwner;
use crate::provider;
use crate::provider::CreationContext;
use crate::provider::OwnerProvider;

#[derive(Debug, Clone)]
pub enum Error {
    /// The proxy was already disposed when the call was made.
    Disposed,
    /// The caller's cancellation token fired before the boundary crossing.
    Cancelled,
    Provider(provider::Error),
    Executor(executor::Error),
    Codec(message::Error),
    /// The blocking constructor could not obtain a runtime.
    Runtime(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disposed => write!(f, "Proxy instance is disposed"),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Provider(e) => write!(f, "Owner provider error: {}", e),
            Self::Executor(e) => write!(f, "Executor error: {}", e),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
            Self::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<provider::Error> for Error {
    fn from(e: provider::Error) -> Self {
        Self::Provider(e)
    }
}

impl From<executor::Error> for Error {
    fn from(e: executor::Error) -> Self {
        Self::Executor(e)
    }
}

impl From<message::Error> for Error {
    fn from(e: message::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The contract every generated illusion type implements.
pub trait Illusion {
    fn instance_id(&self) -> InstanceId;
    fn executor(&self) -> &Arc<Executor>;
    /// False once the proxy has transitioned to disposed.
    fn is_available(&self) -> bool;
}

struct ShellInner {
    owner: ExecutorOwner,
    instance_id: InstanceId,
    disposed: AtomicBool,
    local_cancel: CancelSource,
}

impl ShellInner {
    /// The single dispose path. Idempotent; the atomic swap guards against
    /// duplicate calls from the watcher, explicit dispose, and drop.
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(instance_id = %self.instance_id, "disposing proxy instance");
        self.owner.executor().notify_dispose(self.instance_id);
        self.local_cancel.cancel();
        self.owner.dispose();
    }
}

impl Drop for ShellInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Runtime state embedded in every generated proxy.
pub struct IllusionShell {
    inner: Arc<ShellInner>,
}

impl IllusionShell {
    /// Binds a shell to an established remote instance and registers it on
    /// the executor's running token.
    ///
    /// Must be called within a tokio runtime; the running-token watcher is
    /// a spawned task. The watcher holds only a weak reference, so it
    /// never extends the proxy's lifetime.
    pub fn new(owner: ExecutorOwner, instance_id: InstanceId) -> Self {
        let running = owner.executor().running_token();
        let inner = Arc::new(ShellInner {
            owner,
            instance_id,
            disposed: AtomicBool::new(false),
            local_cancel: CancelSource::new(),
        });

        let watched: Weak<ShellInner> = Arc::downgrade(&inner);
        let local = inner.local_cancel.token();
        tokio::spawn(async move {
            tokio::select! {
                _ = running.cancelled() => {
                    if let Some(inner) = watched.upgrade() {
                        inner.dispose();
                    }
                }
                // Shell disposed or dropped on its own; nothing to do.
                _ = local.cancelled() => {}
            }
        });

        Self { inner }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.inner.instance_id
    }

    pub fn executor(&self) -> &Arc<Executor> {
        self.inner.owner.executor()
    }

    pub fn is_available(&self) -> bool {
        !self.inner.disposed.load(Ordering::Acquire)
    }

    /// This proxy's private cancellation token. Cancelled when the proxy
    /// is disposed, whether locally or through the running token.
    pub fn cancel_token(&self) -> CancelToken {
        self.inner.local_cancel.token()
    }

    /// Fails fast if the proxy has been disposed.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::Disposed)
        }
    }

    /// Forwards one member invocation to the remote instance.
    ///
    /// Never executes against local state: checks liveness, crosses the
    /// boundary, and returns the encoded result pack (empty for unit
    /// results).
    pub async fn invoke(
        &self,
        method: &str,
        pack: Vec<u8>,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        self.ensure_live()?;
        self.inner
            .owner
            .executor()
            .invoke_method(self.inner.instance_id, method, pack, cancel)
            .await
            .map_err(Error::Executor)
    }

    /// Transitions to disposed. Idempotent and safe under concurrent calls
    /// from multiple threads; the disposal notice is sent at most once.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

/// Drives the creation half of the protocol for generated factories.
///
/// Acquires an owner from the provider, allocates the instance id
/// client-side, and sends the creation message. On any failure after the
/// owner is acquired, the owner share is disposed and the original error
/// is re-raised; no instance is left registered. A token cancelled before
/// entry fails without acquiring anything.
pub async fn create_object(
    provider: &dyn OwnerProvider,
    ctx: &CreationContext,
    pack: Vec<u8>,
    cancel: &CancelToken,
) -> Result<(ExecutorOwner, InstanceId)> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let owner = provider.get_executor_owner(ctx, cancel).await?;
    let instance_id = owner.executor().next_instance_id();

    match owner
        .executor()
        .create_object_instance(instance_id, pack, cancel)
        .await
    {
        Ok(()) => Ok((owner, instance_id)),
        Err(e) => {
            owner.dispose();
            Err(Error::Executor(e))
        }
    }
}

/// Runs an async creation to completion on the calling thread.
///
/// Support for the deprecated synchronous constructors only. Inside a
/// multi-thread runtime the future runs via `block_in_place`, so the
/// continuation never waits on the caller's own task context; outside any
/// runtime a throwaway current-thread runtime is built. Calling this from
/// a current-thread runtime is unsupported.
pub fn block_on<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::Runtime(e.to_string()))?;
            runtime.block_on(fut)
        }
    }
}
