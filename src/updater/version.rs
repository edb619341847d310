//! Semantic versions as published in release tags.
//!
//! Release tags are rarely bare semver: `v2.3.0`, `release-1.4`, `V3` all
//! show up in the wild. [`SemanticVersion::parse_tag`] strips any leading
//! non-numeric marker and pads missing minor/patch components so every tag
//! that names a version compares with the usual major.minor.patch ordering.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A totally ordered major.minor.patch version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion(Version);

impl SemanticVersion {
    /// Create a version from its numeric components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a release tag or manifest version string.
    ///
    /// Leading characters up to the first ASCII digit are dropped, and a
    /// version with only one or two numeric components is padded with zeros.
    ///
    /// ```rust,no_run
    /// use component_updater::updater::SemanticVersion;
    ///
    /// assert_eq!(SemanticVersion::parse_tag("v2.3.0").unwrap(), SemanticVersion::new(2, 3, 0));
    /// assert_eq!(SemanticVersion::parse_tag("release-1.4").unwrap(), SemanticVersion::new(1, 4, 0));
    /// ```
    pub fn parse_tag(tag: &str) -> Result<Self, semver::Error> {
        let trimmed = tag.trim();
        let start = trimmed.find(|c: char| c.is_ascii_digit()).unwrap_or(trimmed.len());
        let candidate = &trimmed[start..];

        match Version::parse(candidate) {
            Ok(v) => Ok(Self(v)),
            Err(err) => {
                // Pad "1" / "1.2" (optionally followed by pre-release or build
                // metadata) up to three components and try again.
                let split = candidate.find(['-', '+']).unwrap_or(candidate.len());
                let (core, rest) = candidate.split_at(split);
                let parts = core.split('.').count();
                if core.is_empty() || parts >= 3 {
                    return Err(err);
                }
                let padded = format!("{core}{}{rest}", ".0".repeat(3 - parts));
                Version::parse(&padded).map(Self)
            }
        }
    }

    /// The underlying semver value.
    #[must_use]
    pub const fn as_semver(&self) -> &Version {
        &self.0
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SemanticVersion {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_tag(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = semver::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_tag(&value)
    }
}

impl From<SemanticVersion> for String {
    fn from(value: SemanticVersion) -> Self {
        value.to_string()
    }
}

/// Whether `latest` is strictly newer than `current`.
#[must_use]
pub fn should_update(current: &SemanticVersion, latest: &SemanticVersion) -> bool {
    latest > current
}
