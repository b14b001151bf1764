use std::path::{Path, PathBuf};

use log::trace;

use kdump_api::constants::{KEXEC_CRASH_SIZE_PATH, PROC_MEMINFO_PATH};
use osutils::{files, path::join_relative};

const KIB_PER_MIB: u64 = 1024;
const BYTES_PER_MIB: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Memory source '{path}' is unavailable: {reason}")]
    Unavailable { path: PathBuf, reason: String },
}

impl ProbeError {
    fn unavailable(path: &Path, reason: impl ToString) -> Self {
        ProbeError::Unavailable {
            path: path.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Source of the memory figures the reservation bounds are derived from.
pub trait MemoryProbe {
    /// Total RAM of the machine, in MB.
    fn total_memory_mb(&self) -> Result<u64, ProbeError>;

    /// Memory currently reserved for the crash kernel, in MB.
    fn live_reservation_mb(&self) -> Result<u64, ProbeError>;
}

/// Reads the figures the running kernel exposes through procfs and sysfs.
#[derive(Debug, Clone)]
pub struct ProcfsMemoryProbe {
    host_root: PathBuf,
}

impl ProcfsMemoryProbe {
    pub fn new(host_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
        }
    }
}

impl MemoryProbe for ProcfsMemoryProbe {
    fn total_memory_mb(&self) -> Result<u64, ProbeError> {
        let path = join_relative(&self.host_root, PROC_MEMINFO_PATH);
        let contents = files::read_file_trim(&path).map_err(|e| ProbeError::unavailable(&path, e))?;
        let kib = parse_mem_total(&contents)
            .ok_or_else(|| ProbeError::unavailable(&path, "no parseable MemTotal entry"))?;
        trace!("MemTotal is {kib} kB");
        Ok(kib / KIB_PER_MIB)
    }

    fn live_reservation_mb(&self) -> Result<u64, ProbeError> {
        let path = join_relative(&self.host_root, KEXEC_CRASH_SIZE_PATH);
        let contents = files::read_file_trim(&path).map_err(|e| ProbeError::unavailable(&path, e))?;
        let bytes = contents
            .parse::<u64>()
            .map_err(|e| ProbeError::unavailable(&path, e))?;
        trace!("Crash kernel reservation is {bytes} bytes");
        Ok(bytes / BYTES_PER_MIB)
    }
}

/// Value in kB of the `MemTotal:` line of /proc/meminfo.
fn parse_mem_total(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let value = line.strip_prefix("MemTotal:")?;
        value.split_whitespace().next()?.parse().ok()
    })
}
