//! Maven-style version parsing, ordering and derivation

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PomSyncError, Result};

const SNAPSHOT: &str = "SNAPSHOT";

/// A project version of the form `major[.minor[.bugfix]][-suffix][-SNAPSHOT]`
///
/// Missing minor and bugfix components parse as zero, so `1.2` and `1.2.0`
/// are the same version. The text form keeps as many numeric components as
/// were written (`1.2-SNAPSHOT` releases to `1.2`), widening only when a
/// trailing component becomes non-zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub bugfix: u64,
    pub suffix: Option<String>,
    pub snapshot: bool,
    /// Numeric components in the written form, 1 to 3; not part of equality
    components: u8,
}

impl Version {
    /// Creates a release version without suffix, written with three components
    pub fn new(major: u64, minor: u64, bugfix: u64) -> Self {
        Self {
            major,
            minor,
            bugfix,
            suffix: None,
            snapshot: false,
            components: 3,
        }
    }

    /// Same version carrying the qualifier `suffix` (e.g. `RC1`)
    pub fn with_suffix(self, suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..self
        }
    }

    /// Parses a version string (e.g. "1.2.3", "2.0-RC1-SNAPSHOT")
    ///
    /// # Arguments
    ///
    /// * `version_str` - Version text; surrounding whitespace is ignored
    ///
    /// # Returns
    ///
    /// The parsed version, or [`PomSyncError::MalformedVersion`] when the
    /// text has no numeric part, more than three components, or non-digit
    /// components.
    pub fn parse(version_str: &str) -> Result<Self> {
        let malformed = || PomSyncError::MalformedVersion(version_str.to_string());

        let text = version_str.trim();
        if text.is_empty() {
            return Err(malformed());
        }

        let (text, snapshot) = match text.strip_suffix(SNAPSHOT) {
            Some(rest) => {
                let rest = rest
                    .strip_suffix('-')
                    .or_else(|| rest.strip_suffix('.'))
                    .unwrap_or(rest);
                (rest, true)
            }
            None => (text, false),
        };

        let (numbers, suffix) = match text.split_once('-') {
            Some((numbers, suffix)) => {
                if suffix.is_empty() {
                    return Err(malformed());
                }
                (numbers, Some(suffix.to_string()))
            }
            None => (text, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 3 {
            return Err(malformed());
        }

        let mut components = [0u64; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            *slot = part.parse::<u64>().map_err(|_| malformed())?;
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            bugfix: components[2],
            suffix,
            snapshot,
            components: parts.len() as u8,
        })
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    pub fn is_release(&self) -> bool {
        !self.snapshot
    }

    /// Next major version as a snapshot, e.g. `1.4.2` -> `2.0.0-SNAPSHOT`
    ///
    /// Fails with [`PomSyncError::VersionOverflow`] when the major component
    /// is already `u64::MAX`.
    pub fn increment_major_and_snapshot(&self) -> Result<Self> {
        Ok(self.next_snapshot(bump(self.major, self)?, 0, 0))
    }

    /// Next minor version as a snapshot, e.g. `1.4.2` -> `1.5.0-SNAPSHOT`
    pub fn increment_minor_and_snapshot(&self) -> Result<Self> {
        Ok(self.next_snapshot(self.major, bump(self.minor, self)?, 0))
    }

    /// Next bugfix version as a snapshot, e.g. `1.4.2` -> `1.4.3-SNAPSHOT`
    pub fn increment_bugfix_and_snapshot(&self) -> Result<Self> {
        Ok(self.next_snapshot(self.major, self.minor, bump(self.bugfix, self)?))
    }

    /// Same version without the snapshot marker; the suffix is kept
    pub fn release_version(&self) -> Self {
        Self {
            snapshot: false,
            ..self.clone()
        }
    }

    /// Same version with the snapshot marker; the suffix is kept
    pub fn snapshot_version(&self) -> Self {
        Self {
            snapshot: true,
            ..self.clone()
        }
    }

    /// Returns true if `text` denotes this version, either verbatim or once parsed
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.trim();
        text == self.to_string() || Version::parse(text).map_or(false, |v| v == *self)
    }

    fn next_snapshot(&self, major: u64, minor: u64, bugfix: u64) -> Self {
        Self {
            major,
            minor,
            bugfix,
            suffix: None,
            snapshot: true,
            components: self.components,
        }
    }

    fn written_components(&self) -> u8 {
        let needed = if self.bugfix != 0 {
            3
        } else if self.minor != 0 {
            2
        } else {
            1
        };
        self.components.clamp(1, 3).max(needed)
    }
}

fn bump(component: u64, version: &Version) -> Result<u64> {
    component
        .checked_add(1)
        .ok_or_else(|| PomSyncError::VersionOverflow(version.to_string()))
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.bugfix).hash(state);
        self.suffix.hash(state);
        self.snapshot.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.bugfix)
            .cmp(&(other.major, other.minor, other.bugfix))
            // no suffix sorts first, suffixes compare textually
            .then_with(|| self.suffix.cmp(&other.suffix))
            // a snapshot sorts before its release
            .then_with(|| other.snapshot.cmp(&self.snapshot))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        let components = self.written_components();
        if components >= 2 {
            write!(f, ".{}", self.minor)?;
        }
        if components == 3 {
            write!(f, ".{}", self.bugfix)?;
        }
        if let Some(suffix) = &self.suffix {
            write!(f, "-{}", suffix)?;
        }
        if self.snapshot {
            write!(f, "-{}", SNAPSHOT)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = PomSyncError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = PomSyncError;

    fn try_from(value: String) -> Result<Self> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}
