//! Relay protocol versions and the compatibility predicate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The version this build of the relay reports to clients.
pub const RELAY_VERSION: Version = Version::new(0, 12, 1);

/// The oldest relay a client built from this crate will talk to.
pub const MIN_RELAY_VERSION_REQUIRED: Version = Version::new(0, 12, 0);

/// A `major.minor.patch` version.
///
/// On the wire it is a plain three element array, `[0, 12, 1]`.
///
/// Field order matters: the derived `Ord` compares `major` first, then
/// `minor`, then `patch`, which is exactly the "required version
/// satisfied" ordering.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Creates a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `true` if `self` is at least `required`.
    pub fn satisfies(&self, required: &Version) -> bool {
        self >= required
    }
}

impl From<[u32; 3]> for Version {
    fn from([major, minor, patch]: [u32; 3]) -> Self {
        Self::new(major, minor, patch)
    }
}

impl From<Version> for [u32; 3] {
    fn from(v: Version) -> Self {
        [v.major, v.minor, v.patch]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
