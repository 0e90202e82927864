use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use pkiup_core::Version;

use crate::property_file::PropertyFile;

pub const VERSION_KEY: &str = "PKI_VERSION";
pub const INDEX_KEY: &str = "PKI_UPGRADE_INDEX";

/// Persistent marker of upgrade progress: the current version plus the
/// index of the last completed step within it. Backed by a PropertyFile so
/// unrelated lines in the tracker file survive untouched.
#[derive(Debug, Clone)]
pub struct UpgradeTracker {
    file: PropertyFile,
    version_key: String,
    index_key: String,
    default_version: Version,
}

impl UpgradeTracker {
    /// Opens the system tracker with the fixed key names and the 10.0.0
    /// baseline assumed when no version has ever been recorded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_keys(path, VERSION_KEY, INDEX_KEY, Version::new(10, 0, 0))
    }

    pub fn open_with_keys(
        path: impl Into<PathBuf>,
        version_key: &str,
        index_key: &str,
        default_version: Version,
    ) -> Result<Self> {
        Ok(Self {
            file: PropertyFile::load(path)?,
            version_key: version_key.to_string(),
            index_key: index_key.to_string(),
            default_version,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn lines(&self) -> &[String] {
        self.file.lines()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.file.get(key)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.file.set(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.file.remove(key)
    }

    pub fn write(&self) -> Result<()> {
        self.file.write()
    }

    pub fn version(&self) -> Result<Version> {
        match self.file.get(&self.version_key) {
            Some(value) => Version::parse(value).with_context(|| {
                format!("invalid tracked version in {}", self.file.path().display())
            }),
            None => Ok(self.default_version.clone()),
        }
    }

    pub fn index(&self) -> Result<u32> {
        match self.file.get(&self.index_key) {
            Some(value) => value.parse::<u32>().map_err(|_| {
                anyhow!(
                    "invalid upgrade index '{}' in {}",
                    value,
                    self.file.path().display()
                )
            }),
            None => Ok(0),
        }
    }

    pub fn set_index(&mut self, index: u32) -> Result<()> {
        self.file.set(&self.index_key, &index.to_string());
        self.file.write()
    }

    pub fn remove_index(&mut self) -> Result<()> {
        self.file.remove(&self.index_key);
        self.file.write()
    }

    /// Records arrival at a version: the step index resets with it.
    pub fn set_version(&mut self, version: &Version) -> Result<()> {
        self.file.set(&self.version_key, &version.to_string());
        self.file.remove(&self.index_key);
        self.file.write()
    }

    /// Wipes both tracked keys, leaving any unrelated lines in the file.
    pub fn clear(&mut self) -> Result<()> {
        self.file.remove(&self.version_key);
        self.file.remove(&self.index_key);
        self.file.write()
    }
}
