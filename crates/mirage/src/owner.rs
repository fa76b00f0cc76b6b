//! # Executor Owner
//!
//! A shared, reference-counted handle controlling an executor's lifetime.
//! Each holder disposes its own handle; the executor itself is torn down
//! when the last holder disposes. A proxy that created its own owner
//! releases it on teardown, while a proxy built from a caller-supplied
//! owner only releases its share.
//!
//! ## Invariants
//!
//! - Disposing one handle twice (or from two threads at once) is a no-op
//!   after the first call; the holder count is decremented exactly once
//!   per handle.
//! - The executor's shutdown runs exactly once, on the last holder's
//!   dispose.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tracing::debug;

use crate::executor::Executor;

struct OwnerCore {
    executor: Arc<Executor>,
    holders: AtomicUsize,
}

/// One holder's handle on a shared executor.
pub struct ExecutorOwner {
    core: Arc<OwnerCore>,
    disposed: AtomicBool,
}

impl ExecutorOwner {
    /// Takes initial ownership of an executor, with this handle as the
    /// only holder.
    pub fn new(executor: Arc<Executor>) -> Self {
        Self {
            core: Arc::new(OwnerCore {
                executor,
                holders: AtomicUsize::new(1),
            }),
            disposed: AtomicBool::new(false),
        }
    }

    /// Adds a holder and returns its handle.
    ///
    /// Must be called on a live handle; the new holder keeps the executor
    /// alive until it is disposed in turn.
    pub fn share(&self) -> ExecutorOwner {
        self.core.holders.fetch_add(1, Ordering::AcqRel);
        ExecutorOwner {
            core: self.core.clone(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.core.executor
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Releases this handle's share. Idempotent; the atomic swap guards
    /// against duplicate and concurrent calls.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.core.holders.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("last executor owner disposed, shutting executor down");
            self.core.executor.shutdown();
        }
    }
}

impl std::fmt::Debug for ExecutorOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorOwner")
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Drop for ExecutorOwner {
    fn drop(&mut self) {
        self.dispose();
    }
}
