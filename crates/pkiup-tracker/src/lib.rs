mod property_file;
mod tracker;

pub use property_file::{PropertyFile, DEFAULT_DELIMITER};
pub use tracker::{UpgradeTracker, INDEX_KEY, VERSION_KEY};
