use anyhow::{Context, Error};

use crate::dependencies::Dependency;

/// Release of the running kernel, as printed by `uname -r`.
pub fn kernel_release() -> Result<String, Error> {
    Ok(Dependency::Uname
        .cmd()
        .arg("-r")
        .output_and_check()
        .context("Failed to run uname -r")?
        .trim()
        .to_owned())
}
