//! # Owner Provider
//!
//! The seam through which generated factories obtain an executor owner.
//! How the owner is produced — activating a fresh host process, reusing a
//! pooled one, resolving from a container — is the provider's concern.

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::owner::ExecutorOwner;

#[derive(Debug, Clone)]
pub enum Error {
    /// The external process could not be activated or connected.
    Activation(String),
    /// The caller's cancellation token fired while acquiring the owner.
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activation(msg) => write!(f, "Activation failed: {}", msg),
            Self::Cancelled => write!(f, "Owner acquisition cancelled"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Describes what an owner is being acquired for.
///
/// Generated proxies bake one of these in per type, naming the
/// implementation type and the entry point ("ctor"). Providers may use it
/// to route to a pooled executor or to pick an activation profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationContext {
    pub type_name: &'static str,
    pub entry_point: &'static str,
}

impl CreationContext {
    /// Context for constructing a fresh remote instance of `type_name`.
    pub const fn constructor(type_name: &'static str) -> Self {
        Self {
            type_name,
            entry_point: "ctor",
        }
    }
}

/// Produces executor owners for generated factories.
#[async_trait]
pub trait OwnerProvider: Send + Sync + 'static {
    async fn get_executor_owner(
        &self,
        ctx: &CreationContext,
        cancel: &CancelToken,
    ) -> Result<ExecutorOwner>;
}

/// Provider backed by a single long-lived executor.
///
/// Every acquisition adds a holder on the same owner, so the executor
/// stays up for as long as any proxy (or the provider itself) holds a
/// share.
pub struct SharedOwnerProvider {
    owner: ExecutorOwner,
}

impl SharedOwnerProvider {
    pub fn new(owner: ExecutorOwner) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl OwnerProvider for SharedOwnerProvider {
    async fn get_executor_owner(
        &self,
        _ctx: &CreationContext,
        cancel: &CancelToken,
    ) -> Result<ExecutorOwner> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.owner.share())
    }
}
