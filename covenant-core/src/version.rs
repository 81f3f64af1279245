//! Semantic version value type.
//!
//! Single source of truth for version parsing, comparison and bumping.
//! Contract versions within an asset are strictly monotonically increasing
//! by this ordering.

use crate::ChangeType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version assigned to the first contract published for an asset.
pub const INITIAL_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("cannot parse version '{input}': expected MAJOR.MINOR.PATCH")]
    Malformed { input: String },

    #[error("cannot parse version '{input}': {part} is not a non-negative integer")]
    InvalidPart { input: String, part: String },
}

/// A parsed semantic version: `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl SemVer {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Parse strictly. Pre-release and build metadata are allowed but the
    /// numeric core must be exactly three parts.
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let (without_build, build) = match version.split_once('+') {
            Some((v, b)) => (v, Some(b.to_string())),
            None => (version, None),
        };
        let (core, prerelease) = match without_build.split_once('-') {
            Some((v, p)) => (v, Some(p.to_string())),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::Malformed {
                input: version.to_string(),
            });
        }
        let mut nums = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            nums[i] = part
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidPart {
                    input: version.to_string(),
                    part: part.to_string(),
                })?;
        }

        Ok(Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            prerelease,
            build,
        })
    }

    /// Best-effort parse that never fails, falling back to `1.0.0`.
    ///
    /// Used when handling versions that may have been stored before
    /// validation was enforced.
    pub fn parse_lenient(version: &str) -> Self {
        Self::parse(version).unwrap_or_else(|_| Self::new(1, 0, 0))
    }

    /// Whether this version is a pre-release (has a hyphen component,
    /// build metadata alone does not count).
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The base `X.Y.Z` without pre-release or build metadata.
    pub fn base(&self) -> SemVer {
        SemVer::new(self.major, self.minor, self.patch)
    }

    /// Whether publishing `new` graduates the current pre-release to its
    /// stable release, e.g. `1.0.0-alpha -> 1.0.0`.
    pub fn is_graduation(current: &SemVer, new: &SemVer) -> bool {
        current.is_prerelease() && !new.is_prerelease() && current.base() == new.base()
    }

    /// Bump by change type: major resets minor/patch, minor resets patch.
    pub fn bump(&self, change: ChangeType) -> SemVer {
        match change {
            ChangeType::Major => SemVer::new(self.major + 1, 0, 0),
            ChangeType::Minor => SemVer::new(self.major, self.minor + 1, 0),
            ChangeType::Patch => SemVer::new(self.major, self.minor, self.patch + 1),
        }
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                // A release ranks above any of its pre-releases.
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
        // Build metadata never participates in ordering.
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl FromStr for SemVer {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemVer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SemVer::parse(&s).map_err(serde::de::Error::custom)
    }
}
