use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Three-component version, optionally parsed from `<version>-<release>`.
/// The release text is kept for display only; ordering, equality, and
/// hashing consider `(major, minor, patch)` alone.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    release: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            release: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let (version, release) = match text.split_once('-') {
            Some((version, release)) => (version, Some(release)),
            None => (text, None),
        };

        let mut components = version.split('.');
        let (Some(major), Some(minor), Some(patch), None) = (
            components.next(),
            components.next(),
            components.next(),
            components.next(),
        ) else {
            return Err(invalid_version(text));
        };

        Ok(Self {
            major: parse_component(text, major)?,
            minor: parse_component(text, minor)?,
            patch: parse_component(text, patch)?,
            release: release.map(str::to_string),
        })
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    fn key(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

fn parse_component(text: &str, component: &str) -> Result<u64> {
    component
        .parse::<u64>()
        .map_err(|_| invalid_version(text))
}

fn invalid_version(text: &str) -> anyhow::Error {
    anyhow!("invalid version number: {text}")
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.release {
            Some(release) => write!(
                f,
                "{}.{}.{}-{}",
                self.major, self.minor, self.patch, release
            ),
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
