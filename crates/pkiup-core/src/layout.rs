use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceLayout {
    root: PathBuf,
}

impl InstanceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.root.join("conf")
    }

    pub fn tracker_path(&self) -> PathBuf {
        self.conf_dir().join("pki.version")
    }

    /// Joins an instance-relative path under the root. Step bodies address
    /// every file through this; absolute paths and `..` never pass.
    pub fn resolve_relative(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute() {
            return Err(anyhow!("instance path must be relative: {}", path));
        }
        if relative.as_os_str().is_empty() {
            return Err(anyhow!("instance path must not be empty"));
        }
        if relative
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(anyhow!("instance path must not include '..': {}", path));
        }
        Ok(self.root.join(relative))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.conf_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_instance_root() -> PathBuf {
    match std::env::var("PKIUP_INSTANCE_ROOT") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => PathBuf::from("/var/lib/pkiup"),
    }
}

pub fn default_upgrade_root() -> PathBuf {
    match std::env::var("PKIUP_UPGRADE_ROOT") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => PathBuf::from("/usr/share/pkiup/upgrade"),
    }
}
