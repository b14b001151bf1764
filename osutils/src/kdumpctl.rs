use std::{path::Path, time::Duration};

use log::debug;

use kdump_api::config::DumpMode;

use crate::dependencies::{Dependency, DependencyError};

/// Ask kdumpctl for the default crashkernel reservation of a dump mode.
///
/// With a `root`, the kdumpctl installed in that root is run chrooted into it.
/// Returns the trimmed output, which may be empty when kdumpctl has no
/// recommendation.
pub fn get_default_crashkernel(
    mode: DumpMode,
    root: Option<&Path>,
    timeout: Duration,
) -> Result<String, Box<DependencyError>> {
    let mut cmd = Dependency::Kdumpctl.cmd();
    cmd.args(["get-default-crashkernel", mode.name()])
        .timeout(timeout);
    if let Some(root) = root {
        cmd.root(root);
    }

    debug!("Querying '{}'", cmd.render_command());
    Ok(cmd.output_and_check()?.trim().to_owned())
}
