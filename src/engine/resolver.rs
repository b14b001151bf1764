use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, info, warn};
use serde::Serialize;

use kdump_api::{
    config::DumpMode,
    constants::{self, CRASHKERNEL_AUTO_ARGUMENT, CRASHKERNEL_KEY},
};
use osutils::{files, kdumpctl, path::join_relative};

/// Why the crashkernel tool produced nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("kdumpctl is not installed")]
    NotFound,

    #[error("kdumpctl failed: {0}")]
    Failed(String),
}

/// Something that knows the default crash kernel reservation of a dump mode.
pub trait CrashkernelTool {
    /// Query the tool installed under `root`, or the installer's own copy when
    /// `root` is `None`.
    fn default_crashkernel(&self, mode: DumpMode, root: Option<&Path>) -> Result<String, ToolError>;
}

/// `kdumpctl get-default-crashkernel`, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct KdumpctlTool {
    timeout: Duration,
}

impl KdumpctlTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CrashkernelTool for KdumpctlTool {
    fn default_crashkernel(&self, mode: DumpMode, root: Option<&Path>) -> Result<String, ToolError> {
        kdumpctl::get_default_crashkernel(mode, root, self.timeout).map_err(|e| {
            if e.is_not_found() {
                ToolError::NotFound
            } else {
                ToolError::Failed(e.to_string())
            }
        })
    }
}

/// Where a resolved crashkernel argument came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "kernel")]
pub enum ResolutionSource {
    /// kdumpctl installed in the sysroot.
    SysrootTool,

    /// kdumpctl of the installer environment.
    InstallerTool,

    /// Default file of an installed kernel.
    InstalledKernel(String),

    /// Default file of the running kernel.
    RunningKernel(String),

    /// Nothing produced a value.
    Fallback,
}

/// Outcome of resolving an automatic reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Complete `crashkernel=<value>` argument.
    pub argument: String,

    pub source: ResolutionSource,

    /// Degraded outcomes worth telling the user about.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Resolution {
    fn new(value: &str, source: ResolutionSource, warnings: Vec<String>) -> Self {
        Self {
            argument: as_argument(value),
            source,
            warnings,
        }
    }
}

/// Prefix a bare reservation with `crashkernel=`.
fn as_argument(value: &str) -> String {
    match value.split_once('=') {
        Some((CRASHKERNEL_KEY, _)) => value.to_owned(),
        _ => format!("{CRASHKERNEL_KEY}={value}"),
    }
}

/// Turns an automatic reservation into a literal `crashkernel=` argument.
pub struct CrashkernelResolver<'a> {
    tool: &'a dyn CrashkernelTool,

    /// Root the installer's own files live under.
    host_root: PathBuf,

    /// Release of the installer kernel.
    running_kernel: Option<String>,
}

impl<'a> CrashkernelResolver<'a> {
    pub fn new(
        tool: &'a dyn CrashkernelTool,
        host_root: impl Into<PathBuf>,
        running_kernel: Option<String>,
    ) -> Self {
        Self {
            tool,
            host_root: host_root.into(),
            running_kernel,
        }
    }

    /// Walk the sources in order of preference; the first one that produces
    /// a value wins. Never fails, the last resort is `crashkernel=auto`.
    pub fn resolve_auto(
        &self,
        mode: DumpMode,
        sysroot: &Path,
        installed_kernels: &[String],
    ) -> Resolution {
        let mut warnings = Vec::new();

        if let Some(value) = self.query_tool(mode, Some(sysroot)) {
            return Resolution::new(&value, ResolutionSource::SysrootTool, warnings);
        }

        if let Some(value) = self.query_tool(mode, None) {
            return Resolution::new(&value, ResolutionSource::InstallerTool, warnings);
        }

        if installed_kernels.len() > 1 {
            let warning = format!(
                "{} kernels are installed, using the crashkernel default of the first one \
                 that provides it",
                installed_kernels.len()
            );
            warn!("{warning}");
            warnings.push(warning);
        }

        for kernel in installed_kernels {
            if let Some(value) = read_default_file(sysroot, kernel) {
                return Resolution::new(
                    &value,
                    ResolutionSource::InstalledKernel(kernel.clone()),
                    warnings,
                );
            }
        }

        if let Some(kernel) = &self.running_kernel {
            if let Some(value) = read_default_file(&self.host_root, kernel) {
                return Resolution::new(
                    &value,
                    ResolutionSource::RunningKernel(kernel.clone()),
                    warnings,
                );
            }
        }

        let warning =
            format!("Could not find a default crashkernel value, falling back to '{CRASHKERNEL_AUTO_ARGUMENT}'");
        warn!("{warning}");
        warnings.push(warning);
        Resolution::new(CRASHKERNEL_AUTO_ARGUMENT, ResolutionSource::Fallback, warnings)
    }

    fn query_tool(&self, mode: DumpMode, root: Option<&Path>) -> Option<String> {
        let location = match root {
            Some(root) => format!("under '{}'", root.display()),
            None => "in the installer environment".into(),
        };

        match self.tool.default_crashkernel(mode, root) {
            Ok(value) if !value.trim().is_empty() => {
                info!("kdumpctl {location} recommends '{}'", value.trim());
                Some(value.trim().to_owned())
            }
            Ok(_) => {
                debug!("kdumpctl {location} has no recommendation for {mode}");
                None
            }
            Err(e) => {
                debug!("No recommendation from kdumpctl {location}: {e}");
                None
            }
        }
    }
}

/// Trimmed contents of a kernel's crashkernel default file under `root`.
fn read_default_file(root: &Path, kernel: &str) -> Option<String> {
    let path = join_relative(root, constants::crashkernel_default_path(kernel));
    match files::read_file_trim_if_exists(&path) {
        Ok(Some(value)) if !value.is_empty() => {
            info!("Using crashkernel default from '{}'", path.display());
            Some(value)
        }
        Ok(_) => {
            debug!("No crashkernel default at '{}'", path.display());
            None
        }
        Err(e) => {
            debug!("Skipping '{}': {e:#}", path.display());
            None
        }
    }
}
