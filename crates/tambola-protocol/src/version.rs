//! Protocol versioning for the connect handshake.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol version, major.minor.
///
/// A major bump breaks the frame contract; a minor bump only adds
/// message kinds or optional fields. Clients and server interoperate
/// whenever their majors match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    /// The version this build speaks.
    pub const CURRENT: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// True when the majors match and the two sides can talk.
    #[must_use]
    pub fn is_compatible_with(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major
    }

    /// Human-readable rejection text for a failed handshake.
    pub fn mismatch_reason(&self, ours: &ProtocolVersion) -> String {
        format!("incompatible protocol version {self}, server speaks {ours}")
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
