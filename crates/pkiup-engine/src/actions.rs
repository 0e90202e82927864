use std::collections::BTreeMap;
use std::fs;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use pkiup_core::InstanceLayout;
use pkiup_tracker::PropertyFile;

use crate::manifest::StepManifest;

/// Runnable body of one upgrade step. Errors from `run` are the
/// operator-recoverable class; everything before it (catalog lookup, params
/// decoding) is a configuration error.
pub trait StepBody {
    fn run(&self, instance: &InstanceLayout) -> Result<()>;
}

pub type StepFactory = Box<dyn Fn(&StepManifest) -> Result<Box<dyn StepBody>> + Send + Sync>;

/// Maps action names from step manifests to constructors. Built-in actions
/// are registered up front; deployments register their own with `register`.
/// Discovered entries never execute as code, only as data fed to a factory.
pub struct ActionCatalog {
    factories: BTreeMap<String, StepFactory>,
}

impl ActionCatalog {
    pub fn builtin() -> Self {
        let mut catalog = Self {
            factories: BTreeMap::new(),
        };
        catalog.register("noop", |_| Ok(Box::new(Noop)));
        catalog.register("set-config-key", |manifest| {
            let params: SetConfigKeyParams = decode_params(manifest)?;
            Ok(Box::new(SetConfigKey { params }))
        });
        catalog.register("remove-config-key", |manifest| {
            let params: RemoveConfigKeyParams = decode_params(manifest)?;
            Ok(Box::new(RemoveConfigKey { params }))
        });
        catalog.register("move-file", |manifest| {
            let params: MoveFileParams = decode_params(manifest)?;
            Ok(Box::new(MoveFile { params }))
        });
        catalog.register("remove-file", |manifest| {
            let params: RemoveFileParams = decode_params(manifest)?;
            Ok(Box::new(RemoveFile { params }))
        });
        catalog
    }

    pub fn register<F>(&mut self, action: &str, factory: F)
    where
        F: Fn(&StepManifest) -> Result<Box<dyn StepBody>> + Send + Sync + 'static,
    {
        self.factories.insert(action.to_string(), Box::new(factory));
    }

    pub fn build(&self, manifest: &StepManifest) -> Result<Box<dyn StepBody>> {
        let Some(factory) = self.factories.get(&manifest.action) else {
            return Err(anyhow!("unknown upgrade action: {}", manifest.action));
        };
        factory(manifest)
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

fn decode_params<T: DeserializeOwned>(manifest: &StepManifest) -> Result<T> {
    manifest
        .params_or_empty()
        .try_into()
        .with_context(|| format!("invalid params for action '{}'", manifest.action))
}

struct Noop;

impl StepBody for Noop {
    fn run(&self, _instance: &InstanceLayout) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SetConfigKeyParams {
    file: String,
    key: String,
    value: String,
}

struct SetConfigKey {
    params: SetConfigKeyParams,
}

impl StepBody for SetConfigKey {
    fn run(&self, instance: &InstanceLayout) -> Result<()> {
        let path = instance.resolve_relative(&self.params.file)?;
        let mut file = PropertyFile::load(&path)?;
        file.set(&self.params.key, &self.params.value);
        file.write()
    }
}

#[derive(Debug, Deserialize)]
struct RemoveConfigKeyParams {
    file: String,
    key: String,
}

struct RemoveConfigKey {
    params: RemoveConfigKeyParams,
}

impl StepBody for RemoveConfigKey {
    fn run(&self, instance: &InstanceLayout) -> Result<()> {
        let path = instance.resolve_relative(&self.params.file)?;
        if !path.exists() {
            return Ok(());
        }
        let mut file = PropertyFile::load(&path)?;
        file.remove(&self.params.key);
        file.write()
    }
}

#[derive(Debug, Deserialize)]
struct MoveFileParams {
    from: String,
    to: String,
}

struct MoveFile {
    params: MoveFileParams,
}

impl StepBody for MoveFile {
    fn run(&self, instance: &InstanceLayout) -> Result<()> {
        let from = instance.resolve_relative(&self.params.from)?;
        let to = instance.resolve_relative(&self.params.to)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::rename(&from, &to).with_context(|| {
            format!("failed to move {} to {}", from.display(), to.display())
        })
    }
}

#[derive(Debug, Deserialize)]
struct RemoveFileParams {
    path: String,
}

struct RemoveFile {
    params: RemoveFileParams,
}

impl StepBody for RemoveFile {
    fn run(&self, instance: &InstanceLayout) -> Result<()> {
        let path = instance.resolve_relative(&self.params.path)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}
