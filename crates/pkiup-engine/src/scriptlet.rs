use anyhow::Result;

use pkiup_core::{InstanceLayout, Version};
use pkiup_tracker::UpgradeTracker;

use crate::actions::StepBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    VersionMismatch,
    AlreadyApplied,
    OutOfOrder,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::VersionMismatch => "version mismatch",
            SkipReason::AlreadyApplied => "already applied",
            SkipReason::OutOfOrder => "out of order",
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Applied,
    Skipped(SkipReason),
    /// The step body failed. Recoverable at operator discretion; the
    /// orchestrator decides between aborting and continuing.
    Failed(anyhow::Error),
}

/// One ordered upgrade step for one version. Discovered fresh each run and
/// never persisted; only its effect on the tracker persists. The tracker is
/// always handed in by the caller.
pub struct Scriptlet {
    pub version: Version,
    pub index: u32,
    pub name: String,
    pub last: bool,
    pub message: String,
    body: Box<dyn StepBody>,
}

impl std::fmt::Debug for Scriptlet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scriptlet")
            .field("version", &self.version)
            .field("index", &self.index)
            .field("name", &self.name)
            .field("last", &self.last)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl Scriptlet {
    pub fn new(
        version: Version,
        index: u32,
        name: impl Into<String>,
        last: bool,
        message: impl Into<String>,
        body: Box<dyn StepBody>,
    ) -> Self {
        Self {
            version,
            index,
            name: name.into(),
            last,
            message: message.into(),
            body,
        }
    }

    /// Strict in-order gate: runnable only when the tracker sits exactly one
    /// step behind this scriptlet within the same version.
    pub fn can_run(&self, tracker: &UpgradeTracker) -> Result<bool> {
        Ok(self.skip_reason(tracker)?.is_none())
    }

    pub fn skip_reason(&self, tracker: &UpgradeTracker) -> Result<Option<SkipReason>> {
        if self.version != tracker.version()? {
            return Ok(Some(SkipReason::VersionMismatch));
        }
        let index = tracker.index()?;
        if self.index <= index {
            return Ok(Some(SkipReason::AlreadyApplied));
        }
        if self.index > index + 1 {
            return Ok(Some(SkipReason::OutOfOrder));
        }
        Ok(None)
    }

    /// Marks this step done: intermediate steps record their index, the last
    /// step of a version clears the index and moves the version to `next`.
    pub fn record_completion(&self, tracker: &mut UpgradeTracker, next: &Version) -> Result<()> {
        if self.last {
            tracker.set_version(next)
        } else {
            tracker.set_index(self.index)
        }
    }

    pub fn apply(
        &self,
        instance: &InstanceLayout,
        tracker: &mut UpgradeTracker,
        next: &Version,
    ) -> Result<StepOutcome> {
        if let Some(reason) = self.skip_reason(tracker)? {
            return Ok(StepOutcome::Skipped(reason));
        }
        if let Err(err) = self.body.run(instance) {
            return Ok(StepOutcome::Failed(err));
        }
        self.record_completion(tracker, next)?;
        Ok(StepOutcome::Applied)
    }
}
