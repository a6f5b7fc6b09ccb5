//! Version value type tolerant of non-semver strings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A version reported by an agent or a package manager.
///
/// Parsing never fails: strings that are not `[v]X.Y.Z[-pre][+build]` are kept
/// verbatim as a *raw* version whose numeric fields are zero. Raw versions
/// still print and serialize as the original text, but never compare as newer
/// than anything.
///
/// # Example
///
/// ```rust
/// use agent_inventory::Version;
///
/// let installed = Version::parse("v1.0.0");
/// let latest = Version::parse("1.1.0");
/// assert!(latest.is_newer_than(&installed));
///
/// let odd = Version::parse("nightly-2024");
/// assert!(!odd.is_parsed());
/// assert_eq!(odd.raw(), "nightly-2024");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: String,
    build: String,
    raw: Option<String>,
}

impl Version {
    /// Parse a version string. Never fails.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let cleaned = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        match semver::Version::parse(cleaned) {
            Ok(v) => Self {
                major: v.major,
                minor: v.minor,
                patch: v.patch,
                prerelease: v.pre.as_str().to_string(),
                build: v.build.as_str().to_string(),
                raw: None,
            },
            Err(_) => Self::raw_only(input),
        }
    }

    /// A version built from its numeric components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: String::new(),
            build: String::new(),
            raw: None,
        }
    }

    /// The "could not be determined" version: raw and empty.
    pub fn unknown() -> Self {
        Self::raw_only("")
    }

    fn raw_only(input: &str) -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            prerelease: String::new(),
            build: String::new(),
            raw: Some(input.to_string()),
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Prerelease tag without the leading `-`, empty when absent.
    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    /// Build metadata without the leading `+`, empty when absent.
    pub fn build(&self) -> &str {
        &self.build
    }

    /// The original text when parsing failed, empty otherwise.
    pub fn raw(&self) -> &str {
        self.raw.as_deref().unwrap_or("")
    }

    /// Whether the input was a well-formed version.
    pub fn is_parsed(&self) -> bool {
        self.raw.is_none()
    }

    /// Whether this version is strictly newer than `other`.
    ///
    /// Numeric precedence on `major.minor.patch`; for equal numbers a
    /// release is newer than a prerelease. If either side is raw the
    /// versions are incomparable and this returns `false`.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        if !self.is_parsed() || !other.is_parsed() {
            return false;
        }

        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.prerelease.is_empty() && !other.prerelease.is_empty(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw {
            return f.write_str(raw);
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}
