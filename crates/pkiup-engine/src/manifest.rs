use anyhow::{anyhow, Context};
use serde::Deserialize;

/// Descriptor carried by each `<index>-<name>.toml` entry in a version
/// directory: the operator-facing message plus the action the step maps to.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StepManifest {
    pub message: String,
    pub action: String,
    #[serde(default)]
    pub params: Option<toml::Value>,
}

impl StepManifest {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            toml::from_str(input).context("failed to parse upgrade step manifest")?;
        if manifest.message.trim().is_empty() {
            return Err(anyhow!("step manifest message must not be empty"));
        }
        if manifest.action.trim().is_empty() {
            return Err(anyhow!("step manifest action must not be empty"));
        }
        Ok(manifest)
    }

    pub fn params_or_empty(&self) -> toml::Value {
        self.params
            .clone()
            .unwrap_or_else(|| toml::Value::Table(toml::Table::new()))
    }
}
