use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use pkiup_core::Version;

use crate::actions::ActionCatalog;
use crate::manifest::StepManifest;
use crate::scriptlet::Scriptlet;

/// One discovered version with its orchestrator-computed successor. The
/// final stage's `next` is the target version itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStage {
    pub version: Version,
    pub next: Version,
}

pub fn discover_versions(
    upgrade_root: &Path,
    current: &Version,
    target: &Version,
    filter: Option<&Version>,
) -> Result<Vec<VersionStage>> {
    let mut versions = Vec::new();
    let entries = fs::read_dir(upgrade_root)
        .with_context(|| format!("failed to read upgrade root: {}", upgrade_root.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            return Err(anyhow!(
                "invalid version directory name in {}",
                upgrade_root.display()
            ));
        };
        let version = Version::parse(name).with_context(|| {
            format!("invalid version directory in {}", upgrade_root.display())
        })?;
        if version < *current {
            continue;
        }
        versions.push((version, name.to_string()));
    }

    versions.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut stages = Vec::with_capacity(versions.len());
    for position in 0..versions.len() {
        let next = match versions.get(position + 1) {
            Some((successor, _)) => successor.clone(),
            None => target.clone(),
        };
        stages.push(VersionStage {
            version: versions[position].0.clone(),
            next,
        });
    }

    if let Some(filter) = filter {
        if let Some(stage) = stages.iter().find(|stage| stage.version == *filter) {
            return Ok(vec![stage.clone()]);
        }
        if upgrade_root.join(filter.to_string()).is_dir() {
            // present on disk but already behind the tracker
            return Ok(Vec::new());
        }
        return Err(anyhow!(
            "no upgrade directory for version {} in {}",
            filter,
            upgrade_root.display()
        ));
    }

    Ok(stages)
}

pub fn discover_scriptlets(
    upgrade_root: &Path,
    catalog: &ActionCatalog,
    version: &Version,
    index_filter: Option<u32>,
) -> Result<Vec<Scriptlet>> {
    let dir = upgrade_root.join(version.to_string());
    let entries = fs::read_dir(&dir)
        .with_context(|| format!("failed to read version directory: {}", dir.display()))?;

    let mut scriptlets = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let (index, name) = parse_entry_name(&path)?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read step manifest: {}", path.display()))?;
        let manifest = StepManifest::from_toml_str(&raw)
            .with_context(|| format!("invalid step manifest: {}", path.display()))?;
        let body = catalog
            .build(&manifest)
            .with_context(|| format!("invalid step manifest: {}", path.display()))?;
        scriptlets.push(Scriptlet::new(
            version.clone(),
            index,
            name,
            false,
            manifest.message,
            body,
        ));
    }

    scriptlets.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));

    // the last flag reflects the whole version, not a narrowed selection
    if let Some(highest) = scriptlets.iter().map(|scriptlet| scriptlet.index).max() {
        for scriptlet in &mut scriptlets {
            scriptlet.last = scriptlet.index == highest;
        }
    }

    if let Some(index) = index_filter {
        scriptlets.retain(|scriptlet| scriptlet.index == index);
    }

    Ok(scriptlets)
}

fn parse_entry_name(path: &Path) -> Result<(u32, String)> {
    let Some(stem) = path.file_stem().and_then(|value| value.to_str()) else {
        return Err(anyhow!("invalid step entry name: {}", path.display()));
    };
    let Some((index_text, name)) = stem.split_once('-') else {
        return Err(anyhow!(
            "invalid step entry name (expected <index>-<name>): {}",
            path.display()
        ));
    };
    let index = index_text.parse::<u32>().map_err(|_| {
        anyhow!(
            "invalid step index '{}' in entry name: {}",
            index_text,
            path.display()
        )
    })?;
    if name.is_empty() {
        return Err(anyhow!(
            "invalid step entry name (expected <index>-<name>): {}",
            path.display()
        ));
    }
    Ok((index, name.to_string()))
}
