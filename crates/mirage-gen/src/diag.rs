//! # Diagnostics
//!
//! Definition-time problems never abort generation; they are reported
//! through these and the offending definition or member is skipped.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Stable diagnostic codes.
pub mod codes {
    /// Two proxy definitions for the same (implementation, capability)
    /// pair.
    pub const MULTIPLE_PROXY_DEFINITION: &str = "MIR0001";
    /// A member whose shape cannot cross the boundary.
    pub const UNSUPPORTED_MEMBER_SHAPE: &str = "MIR0002";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn multiple_proxy_definition(implementation: &str, capability: Option<&str>) -> Self {
        let pair = match capability {
            Some(capability) => format!("({}, {})", implementation, capability),
            None => format!("({}, <none>)", implementation),
        };
        Self {
            code: codes::MULTIPLE_PROXY_DEFINITION,
            severity: Severity::Error,
            message: format!("duplicate proxy definition for {}", pair),
        }
    }

    pub fn unsupported_member_shape(owner: &str, member: &str, reason: &str) -> Self {
        Self {
            code: codes::UNSUPPORTED_MEMBER_SHAPE,
            severity: Severity::Warning,
            message: format!("skipping {}::{}: {}", owner, member, reason),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{} [{}]: {}", severity, self.code, self.message)
    }
}
