use std::path::Path;

use anyhow::{Context, Error};
use log::debug;

use kdump_api::constants::{KDUMP_ADDON_KERNEL_FLAG, PROC_CMDLINE_PATH};
use osutils::{files, path::join_relative};

/// Whether `flag` is switched on in a kernel command line. A bare flag is on,
/// `0`, `off`, `no` and `false` switch it off. The last occurrence wins.
pub fn kernel_flag_enabled(cmdline: &str, flag: &str) -> bool {
    cmdline
        .split_whitespace()
        .filter_map(|argument| match argument.split_once('=') {
            Some((key, value)) if key == flag => Some(Some(value)),
            None if argument == flag => Some(None),
            _ => None,
        })
        .last()
        .is_some_and(|value| {
            !matches!(
                value.map(str::to_lowercase).as_deref(),
                Some("0" | "off" | "no" | "false")
            )
        })
}

/// Whether the installer kernel was booted with the kdump add-on flag.
pub fn addon_requested(host_root: &Path) -> Result<bool, Error> {
    let path = join_relative(host_root, PROC_CMDLINE_PATH);
    let cmdline = files::read_file_trim(&path)
        .with_context(|| format!("Failed to read kernel command line from '{}'", path.display()))?;
    let requested = kernel_flag_enabled(&cmdline, KDUMP_ADDON_KERNEL_FLAG);
    debug!("'{KDUMP_ADDON_KERNEL_FLAG}' on the kernel command line: {requested}");
    Ok(requested)
}
