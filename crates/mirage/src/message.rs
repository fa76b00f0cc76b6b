//! # Message Envelopes
//!
//! The three-message contract between a proxy and its remote instance,
//! plus the reply frame. Every request is tagged with the instance id it
//! addresses; creation and invocation additionally carry a sequence number
//! for reply correlation.
//!
//! Envelopes are framed with bincode. Parameter-pack *contents* stay
//! opaque bytes inside the envelope; only the generated code on both sides
//! knows their shape.

use serde::Deserialize;
use serde::Serialize;

/// Errors while framing or unframing envelopes and packs.
#[derive(Debug, Clone)]
pub enum Error {
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(msg) => write!(f, "Encode error: {}", msg),
            Self::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Identifies one remote object bound to one executor.
///
/// Allocated client-side, monotonically, before the remote object exists,
/// so a failed creation still has a well-defined id to reference.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Addresses a client-side delegate carried in place of a closure argument.
///
/// Delegate parameters cannot cross the boundary by value; packs carry the
/// registered callback's id instead. Dispatching callback invocations back
/// to the client is the host-side collaborator's concern.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackId(pub u64);

/// Client-to-host requests, each addressed by instance id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Create the remote object and bind it to `instance_id`.
    CreateObjectInstance {
        instance_id: InstanceId,
        seq: u64,
        pack: Vec<u8>,
    },
    /// Invoke `method` on the object bound to `instance_id`.
    InvokeMethod {
        instance_id: InstanceId,
        seq: u64,
        method: String,
        pack: Vec<u8>,
    },
    /// Release the object bound to `instance_id`. Advisory; no reply.
    DisposeObjectInstance { instance_id: InstanceId },
}

impl Request {
    pub fn instance_id(&self) -> InstanceId {
        match self {
            Self::CreateObjectInstance { instance_id, .. } => *instance_id,
            Self::InvokeMethod { instance_id, .. } => *instance_id,
            Self::DisposeObjectInstance { instance_id } => *instance_id,
        }
    }
}

/// The remote side of a failed creation or invocation.
///
/// Distinct from [`crate::transport::Error`]: a fault means the message
/// arrived and the *remote* object or host failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fault {
    /// No object is bound to the addressed instance id.
    InstanceNotFound,
    /// The object has no such method.
    MethodNotFound,
    /// The parameter pack could not be interpreted.
    BadParameterPack(String),
    /// The remote constructor or method raised.
    Invocation(String),
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstanceNotFound => write!(f, "no object bound to instance id"),
            Self::MethodNotFound => write!(f, "method not found on remote object"),
            Self::BadParameterPack(msg) => write!(f, "bad parameter pack: {}", msg),
            Self::Invocation(msg) => write!(f, "remote invocation failed: {}", msg),
        }
    }
}

/// Host-to-client reply, correlated by sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub seq: u64,
    /// `Ok` carries the encoded result pack (empty for unit results).
    pub status: std::result::Result<Vec<u8>, Fault>,
}

/// Top-level wire frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Envelope {
    Request(Request),
    Reply(Reply),
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Encodes one parameter pack into its opaque wire form.
pub fn encode_pack<T: Serialize>(pack: &T) -> Result<Vec<u8>> {
    bincode::serialize(pack).map_err(|e| Error::Encode(e.to_string()))
}

/// Decodes a result pack returned by a successful invocation.
pub fn decode_pack<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Decode(e.to_string()))
}
