//! # Mirage Runtime
//!
//! The runtime half of the mirage proxy system. Generated illusion types
//! (see the `mirage-gen` crate) are thin forwarding shells over this crate:
//! they embed an [`shell::IllusionShell`], build parameter packs, and drive
//! the create / invoke / dispose protocol through an [`executor::Executor`]
//! that owns the connection to the remote host process.
//!
//! How the remote host process is launched, and how parameter-pack contents
//! are interpreted on the far side, are external concerns. This crate only
//! moves addressed envelopes over a [`transport::Transport`].

pub mod cancel;
pub mod executor;
pub mod message;
pub mod owner;
pub mod provider;
pub mod shell;
pub mod transport;

pub mod mock_transport;

// Re-exported for generated code: pack structs derive these through the
// `mirage::serde` path so consuming crates do not need a direct dependency.
pub use bincode;
pub use serde;

#[cfg(test)]
mod tests;
