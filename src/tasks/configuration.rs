use log::{debug, info, warn};

use kdump_api::{
    config::KdumpConfiguration,
    error::{ConfigurationError, KdumpError, ReportError},
};

use crate::engine::{bootargs, bootloader::BootloaderArguments, EngineContext, Task};

/// Writes the crash kernel reservation and fadump switch into the
/// bootloader's kernel arguments.
pub struct KdumpConfigurationTask {
    desired: KdumpConfiguration,
    bootloader: Box<dyn BootloaderArguments>,
}

impl KdumpConfigurationTask {
    pub fn new(desired: KdumpConfiguration, bootloader: Box<dyn BootloaderArguments>) -> Self {
        Self {
            desired,
            bootloader,
        }
    }
}

impl Task for KdumpConfigurationTask {
    fn name(&self) -> &'static str {
        "Configure kdump and fadump"
    }

    fn run(&mut self, ctx: &EngineContext) -> Result<(), KdumpError> {
        let current = self
            .bootloader
            .extra_arguments()
            .structured(ConfigurationError::ReadBootArguments)?;

        let updated = bootargs::apply(&current, &self.desired, ctx.fadump_capable, |mode| {
            let resolution = ctx.resolve_auto(mode);
            for warning in &resolution.warnings {
                warn!("{warning}");
            }
            resolution.argument
        });

        if updated == current {
            debug!("Boot arguments already up to date");
            return Ok(());
        }

        self.bootloader
            .set_extra_arguments(updated)
            .structured(ConfigurationError::ConfigurationApplyFailure)?;
        info!("Updated boot arguments");

        Ok(())
    }
}
