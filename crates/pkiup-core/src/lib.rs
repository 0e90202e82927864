mod layout;
mod version;

pub use layout::{default_instance_root, default_upgrade_root, InstanceLayout};
pub use version::Version;
