use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, warn};

use kdump_api::{
    config::{AgentConfiguration, DumpMode, MemoryBounds},
    constants::FADUMP_CAPABLE_FILE,
};
use osutils::{path::join_relative, uname};
use sysdefs::arch::SystemArchitecture;

use super::{
    bootargs,
    bounds::BoundsCache,
    probe::{MemoryProbe, ProcfsMemoryProbe},
    resolver::{CrashkernelResolver, CrashkernelTool, KdumpctlTool, Resolution},
};

#[cfg(test)]
mod test_utils;

/// Everything a configuration pass needs to know about the machine, detected
/// once up front.
pub struct EngineContext {
    pub config: AgentConfiguration,

    /// Architecture the bounds are computed for.
    pub architecture: SystemArchitecture,

    /// Whether the platform supports firmware-assisted dump.
    pub fadump_capable: bool,

    /// Release of the installer kernel, if known.
    pub running_kernel: Option<String>,

    /// Bounds of this pass. Reset between independent passes.
    pub bounds: BoundsCache,

    pub probe: Box<dyn MemoryProbe>,

    pub tool: Box<dyn CrashkernelTool>,
}

impl EngineContext {
    pub fn new(config: AgentConfiguration) -> Self {
        let architecture = config.architecture();
        let fadump_capable = architecture.is_powerpc()
            && join_relative(&config.host_root, FADUMP_CAPABLE_FILE).exists();
        let running_kernel = config.running_kernel.clone().or_else(|| {
            uname::kernel_release()
                .map_err(|e| warn!("Could not determine the running kernel: {e:#}"))
                .ok()
        });
        debug!(
            "Architecture: {architecture}, fadump capable: {fadump_capable}, running kernel: {}",
            running_kernel.as_deref().unwrap_or("unknown")
        );

        Self {
            probe: Box::new(ProcfsMemoryProbe::new(&config.host_root)),
            tool: Box::new(KdumpctlTool::new(Duration::from_secs(
                config.tool_timeout_secs,
            ))),
            bounds: BoundsCache::new(),
            architecture,
            fadump_capable,
            running_kernel,
            config,
        }
    }

    pub fn sysroot(&self) -> &Path {
        &self.config.sysroot
    }

    /// GRUB defaults file of the target system.
    pub fn bootloader_defaults_path(&self) -> PathBuf {
        join_relative(&self.config.sysroot, &self.config.bootloader_defaults)
    }

    /// Reservation bounds of this machine, cached for the pass.
    pub fn bounds(&self) -> MemoryBounds {
        self.bounds
            .get_or_compute(self.architecture, self.probe.as_ref())
    }

    /// Dump mode that applies when fadump is or is not requested.
    pub fn dump_mode(&self, fadump_requested: bool) -> DumpMode {
        bootargs::dump_mode(fadump_requested, self.fadump_capable)
    }

    /// Resolve an automatic reservation for the target system.
    pub fn resolve_auto(&self, mode: DumpMode) -> Resolution {
        CrashkernelResolver::new(
            self.tool.as_ref(),
            &self.config.host_root,
            self.running_kernel.clone(),
        )
        .resolve_auto(mode, self.sysroot(), &self.config.installed_kernels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use crate::engine::{
        probe::tests::FixedMemoryProbe,
        resolver::{tests::ScriptedTool, ResolutionSource},
    };

    #[test]
    fn test_new_detects_fadump() {
        let host = tempfile::tempdir().unwrap();
        let config = AgentConfiguration {
            host_root: host.path().to_owned(),
            running_kernel: Some("6.5.0-1".into()),
            architecture: Some(SystemArchitecture::Ppc64le),
            ..Default::default()
        };
        let ctx = EngineContext::new(config.clone());
        assert!(!ctx.fadump_capable);
        assert_eq!(ctx.dump_mode(true), DumpMode::Kdump);
        assert_eq!(ctx.architecture, SystemArchitecture::Ppc64le);
        assert_eq!(ctx.running_kernel.as_deref(), Some("6.5.0-1"));

        let marker = join_relative(host.path(), FADUMP_CAPABLE_FILE);
        fs::create_dir_all(marker.parent().unwrap()).unwrap();
        fs::write(&marker, "").unwrap();
        let ctx = EngineContext::new(config.clone());
        assert!(ctx.fadump_capable);
        assert_eq!(ctx.dump_mode(true), DumpMode::Fadump);
        assert_eq!(ctx.dump_mode(false), DumpMode::Kdump);

        // Firmware-assisted dump only exists on PowerPC
        let ctx = EngineContext::new(AgentConfiguration {
            architecture: Some(SystemArchitecture::Amd64),
            ..config
        });
        assert!(!ctx.fadump_capable);
    }

    #[test]
    fn test_bootloader_defaults_path() {
        let ctx = EngineContext::default().with_sysroot("/mnt/sysimage");
        assert_eq!(
            ctx.bootloader_defaults_path(),
            Path::new("/mnt/sysimage/etc/default/grub")
        );
    }

    #[test]
    fn test_bounds_cached_per_context() {
        let ctx = EngineContext::default()
            .with_architecture(SystemArchitecture::Aarch64)
            .with_probe(FixedMemoryProbe {
                total: Some(65024),
                live: Some(512),
            });
        let bounds = ctx.bounds();
        assert_eq!((bounds.lower, bounds.upper, bounds.step), (512, 65024, 1));
        assert_eq!(ctx.bounds.cached(), Some(bounds));
    }

    #[test]
    fn test_resolve_auto_uses_sysroot() {
        let ctx = EngineContext::default()
            .with_sysroot("/mnt/sysimage")
            .with_tool(ScriptedTool::new([Ok("crashkernel=2G".into())]));
        let resolution = ctx.resolve_auto(DumpMode::Kdump);
        assert_eq!(resolution.argument, "crashkernel=2G");
        assert_eq!(resolution.source, ResolutionSource::SysrootTool);
    }
}
