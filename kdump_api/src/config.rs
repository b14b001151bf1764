use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::IntoStaticStr;

use sysdefs::arch::SystemArchitecture;

use crate::{
    constants::{
        DEFAULT_TOOL_TIMEOUT_SECS, GRUB_DEFAULTS_RELATIVE_PATH, RESERVED_MEMORY_AUTO,
        RESERVED_MEMORY_UNIT,
    },
    error::{InvalidInputError, KdumpError, ReportError},
};

/// Dump mechanism the crash kernel reservation is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DumpMode {
    /// Classic kexec-based dump.
    Kdump,

    /// Firmware-assisted dump (PowerPC only).
    Fadump,
}

impl DumpMode {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl Display for DumpMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Reasons a reservation string can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservedMemoryParseError {
    #[error("value is empty")]
    Empty,

    #[error("'{0}' is not 'auto' or a whole number of MB")]
    NotANumber(String),
}

/// Amount of memory to reserve for the crash kernel.
///
/// The textual form is either `auto` or a whole number of megabytes,
/// optionally suffixed with `M`. Quotes left over from kickstart quoting are
/// ignored. The canonical form always carries the `M` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReservedMemory {
    /// Let the installed kernel package decide.
    #[default]
    Auto,

    /// Reserve exactly this many megabytes.
    Megabytes(u64),
}

impl ReservedMemory {
    pub fn is_auto(&self) -> bool {
        matches!(self, ReservedMemory::Auto)
    }

    /// Number of megabytes, without unit, as kickstart stores it.
    pub fn bare(&self) -> String {
        match self {
            ReservedMemory::Auto => RESERVED_MEMORY_AUTO.into(),
            ReservedMemory::Megabytes(mb) => mb.to_string(),
        }
    }
}

impl FromStr for ReservedMemory {
    type Err = ReservedMemoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().trim_matches(|c| c == '\'' || c == '"');
        if value.is_empty() {
            return Err(ReservedMemoryParseError::Empty);
        }

        if value == RESERVED_MEMORY_AUTO {
            return Ok(ReservedMemory::Auto);
        }

        let digits = value.strip_suffix(RESERVED_MEMORY_UNIT).unwrap_or(value);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ReservedMemoryParseError::NotANumber(value.to_string()));
        }

        digits
            .parse()
            .map(ReservedMemory::Megabytes)
            .map_err(|_| ReservedMemoryParseError::NotANumber(value.to_string()))
    }
}

impl Display for ReservedMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ReservedMemory::Auto => f.write_str(RESERVED_MEMORY_AUTO),
            ReservedMemory::Megabytes(mb) => write!(f, "{mb}{RESERVED_MEMORY_UNIT}"),
        }
    }
}

impl Serialize for ReservedMemory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReservedMemory {
    fn deserialize<D>(deserializer: D) -> Result<ReservedMemory, D::Error>
    where
        D: Deserializer<'de>,
    {
        // YAML happily hands us `reservedMemory: 256` as a number.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(mb) => Ok(ReservedMemory::Megabytes(mb)),
            Raw::Text(s) => ReservedMemory::from_str(&s).map_err(D::Error::custom),
        }
    }
}

/// Desired crash dump state of the installed system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KdumpConfiguration {
    /// Whether kdump is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Whether firmware-assisted dump is requested.
    #[serde(default)]
    pub fadump: bool,

    /// Amount of memory to reserve for the crash kernel.
    #[serde(default)]
    pub reserved_memory: ReservedMemory,
}

/// Legal range, in MB, of the crash kernel reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBounds {
    pub lower: u64,
    pub upper: u64,
    pub step: u64,
}

impl MemoryBounds {
    /// Inclusive range check.
    pub fn contains(&self, mb: u64) -> bool {
        (self.lower..=self.upper).contains(&mb)
    }
}

impl Display for MemoryBounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} - {} MB", self.lower, self.upper)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_bootloader_defaults() -> PathBuf {
    PathBuf::from(GRUB_DEFAULTS_RELATIVE_PATH)
}

fn default_tool_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

/// Configuration of a kdumpcfg run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentConfiguration {
    /// Desired dump configuration.
    #[serde(default)]
    pub kdump: KdumpConfiguration,

    /// Root of the system being configured.
    #[serde(default = "default_root")]
    pub sysroot: PathBuf,

    /// Root the installer's own files (proc, sys, kernel modules) are read from.
    #[serde(default = "default_root")]
    pub host_root: PathBuf,

    /// Kernel versions installed in the sysroot, newest first.
    #[serde(default)]
    pub installed_kernels: Vec<String>,

    /// Release of the running kernel. Queried with `uname -r` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_kernel: Option<String>,

    /// Architecture override. The build target's architecture when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<SystemArchitecture>,

    /// GRUB defaults file holding the kernel command line, relative to the
    /// sysroot.
    #[serde(default = "default_bootloader_defaults")]
    pub bootloader_defaults: PathBuf,

    /// Bounded wait applied to every external tool invocation.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Only run when `kdump_addon` is set on the installer kernel command line.
    #[serde(default)]
    pub require_kernel_flag: bool,
}

impl Default for AgentConfiguration {
    fn default() -> Self {
        Self {
            kdump: KdumpConfiguration::default(),
            sysroot: default_root(),
            host_root: default_root(),
            installed_kernels: Vec::new(),
            running_kernel: None,
            architecture: None,
            bootloader_defaults: default_bootloader_defaults(),
            tool_timeout_secs: default_tool_timeout_secs(),
            require_kernel_flag: false,
        }
    }
}

impl AgentConfiguration {
    /// Load the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KdumpError> {
        let contents = std::fs::read_to_string(path.as_ref()).structured(
            InvalidInputError::LoadConfiguration {
                path: path.as_ref().display().to_string(),
            },
        )?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, KdumpError> {
        serde_yaml::from_str(contents).structured(InvalidInputError::ParseConfiguration)
    }

    /// The architecture to compute bounds for.
    pub fn architecture(&self) -> SystemArchitecture {
        self.architecture.unwrap_or_else(SystemArchitecture::current)
    }
}
