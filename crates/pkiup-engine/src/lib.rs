mod actions;
mod discovery;
mod manifest;
mod scriptlet;
mod upgrader;

pub use actions::{ActionCatalog, StepBody, StepFactory};
pub use discovery::{discover_scriptlets, discover_versions, VersionStage};
pub use manifest::StepManifest;
pub use scriptlet::{Scriptlet, SkipReason, StepOutcome};
pub use upgrader::{StageSummary, UpgradeConsole, UpgradeReport, Upgrader, UpgraderOptions};
