// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine version tags stamped into compiled plans.
//!
//! Format history (additive evolution only; every later field has a neutral
//! default so older documents keep parsing):
//!
//! - `1.0.0` initial document format.
//! - `1.1.0` aggregate `emitPolicy` (default: both flags `false`) and edge
//!   `bufferingMode` (default: `pipelined`).
//! - `1.2.0` node `hints` (default: empty), payload `digest` (absent: no
//!   digest check) and window `properties` (default: empty).
//!
//! In every version a time attribute without `nullable` is nullable, matching
//! the constructors.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// `major.minor.patch` version of the engine build that produced a plan.
///
/// Ordering is lexicographic over `(major, minor, patch)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EngineVersion {
    /// Major component.
    pub major: u16,
    /// Minor component.
    pub minor: u16,
    /// Patch component.
    pub patch: u16,
}

impl EngineVersion {
    /// Version of the plan format written by this build.
    pub const CURRENT: Self = Self::new(1, 2, 0);

    /// Oldest format this build reads without a migration hook.
    pub const OLDEST_SUPPORTED: Self = Self::new(1, 0, 0);

    /// Builds a version from its components.
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `true` if a reader at `self` may load a document tagged `doc`.
    ///
    /// Documents from a newer build are never readable; there is no
    /// best-effort path for them.
    pub fn can_read(self, doc: Self) -> bool {
        doc <= self
    }
}

impl Default for EngineVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Failure to parse an [`EngineVersion`] tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid engine version tag {0:?}; expected `major.minor[.patch]`")]
pub struct VersionParseError(pub String);

impl FromStr for EngineVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VersionParseError(s.to_owned());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u16, VersionParseError> {
            match parts.next() {
                Some(p) => p.parse::<u16>().map_err(|_| bad()),
                None if required => Err(bad()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(true)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self::new(major, minor, patch))
    }
}

impl Serialize for EngineVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EngineVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
