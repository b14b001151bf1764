use std::path::Path;

use log::debug;

use kdump_api::{
    constants::KDUMP_SERVICE,
    error::{InstallationError, KdumpError},
};
use osutils::{dependencies::DependencyResultExt, systemd};

use crate::engine::{EngineContext, Task};

/// Enables units on the target system.
pub trait ServiceManager {
    fn enable(&self, root: &Path, unit: &str) -> Result<(), KdumpError>;
}

/// `systemctl enable` against the unit files under the root.
#[derive(Debug, Default)]
pub struct SystemctlServiceManager;

impl ServiceManager for SystemctlServiceManager {
    fn enable(&self, root: &Path, unit: &str) -> Result<(), KdumpError> {
        systemd::enable_unit(root, unit).structured_message(
            InstallationError::ServiceEnableFailure {
                service: unit.into(),
            },
            format!("Failed to run systemctl under '{}'", root.display()),
        )
    }
}

/// Enables the kdump service on the installed system.
pub struct KdumpInstallationTask {
    enabled: bool,
    services: Box<dyn ServiceManager>,
}

impl KdumpInstallationTask {
    pub fn new(enabled: bool, services: Box<dyn ServiceManager>) -> Self {
        Self { enabled, services }
    }
}

impl Task for KdumpInstallationTask {
    fn name(&self) -> &'static str {
        "Enable the kdump.service"
    }

    fn run(&mut self, ctx: &EngineContext) -> Result<(), KdumpError> {
        if !self.enabled {
            debug!("Kdump is disabled. Skipping.");
            return Ok(());
        }

        self.services.enable(ctx.sysroot(), KDUMP_SERVICE)
    }
}
