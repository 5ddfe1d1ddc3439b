//! Protocol versioning for the live endpoint.
//!
//! The client announces its major version in the `connect` frame and the
//! server echoes the negotiated one in `connected`. Only the major number
//! has to agree; minor bumps add optional fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version spoken by this client.
pub const PROTOCOL_VERSION: Version = Version::new(1, 0);

/// A `major.minor` protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether a server announcing `major` can talk to this version.
    #[must_use]
    pub fn accepts_major(&self, major: u8) -> bool {
        self.major == major
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Default for Version {
    fn default() -> Self {
        PROTOCOL_VERSION
    }
}
