use std::path::PathBuf;

use anyhow::{anyhow, Result};

use pkiup_core::{InstanceLayout, Version};
use pkiup_tracker::UpgradeTracker;

use crate::actions::ActionCatalog;
use crate::discovery::{self, VersionStage};
use crate::scriptlet::{Scriptlet, StepOutcome};

/// Operator interaction capability. Keeps the sequencing logic free of any
/// terminal handling; silent runs never see `confirm`.
pub trait UpgradeConsole {
    /// Operator-facing line, always shown.
    fn notice(&mut self, text: &str);

    /// Diagnostic line. Implementations decide whether to show it, normally
    /// only in verbose runs.
    fn log(&mut self, text: &str);

    fn confirm(&mut self, prompt: &str, default_yes: bool) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct UpgraderOptions {
    pub instance_root: PathBuf,
    pub upgrade_root: PathBuf,
    pub target: Version,
    pub version_filter: Option<Version>,
    pub index_filter: Option<u32>,
    pub silent: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub version: Version,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageSummary {
    fn new(version: Version) -> Self {
        Self {
            version,
            applied: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub stages: Vec<StageSummary>,
    pub tracked: Version,
    pub target: Version,
}

impl UpgradeReport {
    pub fn complete(&self) -> bool {
        self.tracked == self.target
    }
}

/// Drives the tracker through every pending version stage in order. The
/// tracker is read once at `open` and reused for the whole run; re-reading
/// it per decision could observe a half-written state.
pub struct Upgrader {
    layout: InstanceLayout,
    upgrade_root: PathBuf,
    target: Version,
    version_filter: Option<Version>,
    index_filter: Option<u32>,
    silent: bool,
    verbose: bool,
    catalog: ActionCatalog,
    tracker: UpgradeTracker,
}

impl Upgrader {
    pub fn open(options: UpgraderOptions, catalog: ActionCatalog) -> Result<Self> {
        let layout = InstanceLayout::new(options.instance_root);
        let tracker = UpgradeTracker::open(layout.tracker_path())?;
        Ok(Self {
            layout,
            upgrade_root: options.upgrade_root,
            target: options.target,
            version_filter: options.version_filter,
            index_filter: options.index_filter,
            silent: options.silent,
            verbose: options.verbose,
            catalog,
            tracker,
        })
    }

    pub fn layout(&self) -> &InstanceLayout {
        &self.layout
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn tracker(&self) -> &UpgradeTracker {
        &self.tracker
    }

    pub fn target(&self) -> &Version {
        &self.target
    }

    pub fn discover_versions(&self) -> Result<Vec<VersionStage>> {
        let current = self.tracker.version()?;
        discovery::discover_versions(
            &self.upgrade_root,
            &current,
            &self.target,
            self.version_filter.as_ref(),
        )
    }

    pub fn discover_scriptlets(&self, version: &Version) -> Result<Vec<Scriptlet>> {
        discovery::discover_scriptlets(
            &self.upgrade_root,
            &self.catalog,
            version,
            self.index_filter,
        )
    }

    pub fn run(&mut self, console: &mut dyn UpgradeConsole) -> Result<UpgradeReport> {
        let stages = self.discover_versions()?;
        let mut summaries = Vec::with_capacity(stages.len());
        for stage in &stages {
            summaries.push(self.run_version(console, stage)?);
        }
        Ok(UpgradeReport {
            stages: summaries,
            tracked: self.tracker.version()?,
            target: self.target.clone(),
        })
    }

    pub fn run_version(
        &mut self,
        console: &mut dyn UpgradeConsole,
        stage: &VersionStage,
    ) -> Result<StageSummary> {
        console.notice(&format!("Upgrading version {}:", stage.version));
        let mut summary = StageSummary::new(stage.version.clone());
        let scriptlets = self.discover_scriptlets(&stage.version)?;

        if scriptlets.is_empty() {
            // A version with no steps passes straight through, but only when
            // the tracker actually sits at it and no index filter narrowed
            // the selection; a narrowed run must not clobber real progress.
            if self.index_filter.is_none() && self.tracker.version()? == stage.version {
                console.log(&format!(
                    "No steps for version {}, advancing to {}",
                    stage.version, stage.next
                ));
                self.tracker.set_version(&stage.next)?;
            }
            return Ok(summary);
        }

        for scriptlet in &scriptlets {
            let banner = format!("{}. {}", scriptlet.index, scriptlet.message);
            if self.silent {
                console.notice(&banner);
            } else if !console.confirm(&banner, true)? {
                return Err(anyhow!("upgrade canceled"));
            }

            match scriptlet.apply(&self.layout, &mut self.tracker, &stage.next)? {
                StepOutcome::Applied => summary.applied += 1,
                StepOutcome::Skipped(reason) => {
                    summary.skipped += 1;
                    // skips are diagnostics, never operator-facing errors
                    console.log(&format!(
                        "Skipping {}-{} ({})",
                        scriptlet.index,
                        scriptlet.name,
                        reason.as_str()
                    ));
                }
                StepOutcome::Failed(err) => {
                    summary.failed += 1;
                    console.notice(&format!(
                        "Step {}-{} failed: {err:#}",
                        scriptlet.index, scriptlet.name
                    ));
                    let fatal = if self.silent {
                        true
                    } else {
                        !console.confirm("Continue past the failed step?", false)?
                    };
                    if fatal {
                        return Err(err.context(format!(
                            "upgrade failed at step {}-{} of version {}",
                            scriptlet.index, scriptlet.name, stage.version
                        )));
                    }
                    // Continuing leaves the tracker untouched, so the steps
                    // after the failed one skip as out of order.
                }
            }
        }

        Ok(summary)
    }

    pub fn is_complete(&self) -> Result<bool> {
        Ok(self.tracker.version()? == self.target)
    }

    /// Recovery override: declare the whole sequence satisfied by pointing
    /// the tracker straight at the target version.
    pub fn reset_tracker(&mut self) -> Result<()> {
        let target = self.target.clone();
        self.tracker.set_version(&target)
    }

    /// Recovery override: wipe the tracked state back to unset.
    pub fn remove_tracker(&mut self) -> Result<()> {
        self.tracker.clear()
    }
}
