use std::path::Path;

use log::debug;

use crate::dependencies::{Dependency, DependencyError};

/// Enable a unit in the system installed at `root`.
///
/// systemctl operates on the unit symlinks under the root directly, so this
/// works without a running systemd inside the root.
pub fn enable_unit(root: impl AsRef<Path>, unit: &str) -> Result<(), Box<DependencyError>> {
    debug!(
        "Enabling unit '{unit}' under '{}'",
        root.as_ref().display()
    );
    Dependency::Systemctl.cmd().args(enable_args(root.as_ref(), unit)).run_and_check()
}

fn enable_args(root: &Path, unit: &str) -> Vec<String> {
    vec![
        "enable".into(),
        unit.into(),
        format!("--root={}", root.display()),
    ]
}
