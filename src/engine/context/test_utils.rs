#![allow(dead_code)]
//! Builders for `EngineContext` test instances that never touch the host.

use std::path::PathBuf;

use kdump_api::config::{AgentConfiguration, KdumpConfiguration};
use sysdefs::arch::SystemArchitecture;

use crate::engine::{
    bounds::BoundsCache,
    probe::{tests::FixedMemoryProbe, MemoryProbe},
    resolver::{tests::ScriptedTool, CrashkernelTool},
};

use super::EngineContext;

impl Default for EngineContext {
    /// An x86_64 machine with 4 GB of memory where kdumpctl is missing.
    fn default() -> Self {
        Self {
            config: AgentConfiguration {
                running_kernel: Some("6.5.0-installer".into()),
                ..Default::default()
            },
            architecture: SystemArchitecture::Amd64,
            fadump_capable: false,
            running_kernel: Some("6.5.0-installer".into()),
            bounds: BoundsCache::new(),
            probe: Box::new(FixedMemoryProbe {
                total: Some(4096),
                live: Some(0),
            }),
            tool: Box::<ScriptedTool>::default(),
        }
    }
}

impl EngineContext {
    pub(crate) fn with_kdump(mut self, kdump: KdumpConfiguration) -> Self {
        self.config.kdump = kdump;
        self
    }

    pub(crate) fn with_sysroot(mut self, sysroot: impl Into<PathBuf>) -> Self {
        self.config.sysroot = sysroot.into();
        self
    }

    pub(crate) fn with_host_root(mut self, host_root: impl Into<PathBuf>) -> Self {
        self.config.host_root = host_root.into();
        self
    }

    pub(crate) fn with_installed_kernels(mut self, kernels: &[&str]) -> Self {
        self.config.installed_kernels = kernels.iter().map(|k| k.to_string()).collect();
        self
    }

    pub(crate) fn with_architecture(mut self, architecture: SystemArchitecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub(crate) fn with_fadump_capable(mut self, capable: bool) -> Self {
        self.fadump_capable = capable;
        self
    }

    pub(crate) fn with_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub(crate) fn with_tool(mut self, tool: impl CrashkernelTool + 'static) -> Self {
        self.tool = Box::new(tool);
        self
    }
}
