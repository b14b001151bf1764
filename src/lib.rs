use std::path::Path;

use log::{info, warn};

use kdump_api::{
    config::{AgentConfiguration, DumpMode, MemoryBounds, ReservedMemory},
    error::{InvalidInputError, KdumpError, KdumpResultExt, ReportError},
};
use setsail::{KdumpAddonData, KsTranslator, SetsailErrorList};

pub mod cli;
mod cmdline;
pub mod engine;
pub mod settings;
pub mod tasks;

use engine::{bootloader::GrubDefaultsArguments, resolver::Resolution, validator, EngineContext};
use settings::{KdumpSettings, Requirement};
use tasks::SystemctlServiceManager;

/// Version reported by the CLI, overridable at build time.
pub const KDUMPCFG_VERSION: &str = match option_env!("KDUMPCFG_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Read the kdump add-on section out of a kickstart file.
pub fn load_kickstart(path: impl AsRef<Path>) -> Result<KdumpAddonData, KdumpError> {
    let path = path.as_ref();
    info!("Loading kickstart from '{}'", path.display());
    let lines = setsail::load_kickstart_file(path).structured(InvalidInputError::LoadKickstart {
        path: path.display().to_string(),
    })?;

    KsTranslator::new()
        .include_fail_is_error(false)
        .verbose(true)
        .translate(&lines)
        .map_err(SetsailErrorList)
        .structured(InvalidInputError::ParseKickstart)
}

/// Configures kdump on one target system.
pub struct Kdumpcfg {
    ctx: EngineContext,
    settings: KdumpSettings,
}

impl Kdumpcfg {
    /// Detect the machine and take the desired state from the configuration.
    pub fn new(config: AgentConfiguration) -> Self {
        Self::from_context(EngineContext::new(config))
    }

    /// Like `new`, with the desired state taken from a kickstart instead.
    pub fn with_kickstart(
        config: AgentConfiguration,
        kickstart: impl AsRef<Path>,
    ) -> Result<Self, KdumpError> {
        let data = load_kickstart(kickstart)?;
        let mut kdumpcfg = Self::new(config);
        kdumpcfg.settings.process_kickstart(&data);
        Ok(kdumpcfg)
    }

    pub fn from_context(ctx: EngineContext) -> Self {
        let mut settings = KdumpSettings::new(&ctx.bounds());
        settings.apply_configuration(&ctx.config.kdump);
        Self { ctx, settings }
    }

    pub fn settings(&self) -> &KdumpSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut KdumpSettings {
        &mut self.settings
    }

    /// Start a new configuration pass: bounds are computed again on next use.
    pub fn reset(&self) {
        self.ctx.bounds.reset();
    }

    pub fn bounds(&self) -> MemoryBounds {
        self.ctx.bounds()
    }

    /// Check a reservation against the bounds of this machine.
    pub fn validate(&self, value: &str) -> Result<ReservedMemory, KdumpError> {
        validator::normalize(value, &self.bounds())
    }

    /// Resolve an automatic reservation. Without an explicit mode the mode
    /// follows the fadump setting.
    pub fn resolve(&self, mode: Option<DumpMode>) -> Resolution {
        let mode = mode.unwrap_or_else(|| self.ctx.dump_mode(self.settings.fadump_enabled()));
        self.ctx.resolve_auto(mode)
    }

    pub fn requirements(&self) -> Vec<Requirement> {
        self.settings.collect_requirements()
    }

    /// Write the dump configuration into the bootloader defaults of the
    /// target system.
    pub fn configure(&self) -> Result<(), KdumpError> {
        if !self.addon_active() {
            return Ok(());
        }

        if self.settings.kdump_enabled() {
            let reserved = self.settings.reserved_memory();
            self.validate(&reserved.bare())
                .message("Reservation is outside the bounds of this machine")?;
        }

        let bootloader = GrubDefaultsArguments::new(self.ctx.bootloader_defaults_path());
        engine::run_tasks(
            &self.ctx,
            self.settings.configure_with_tasks(Box::new(bootloader)),
        )
        .message("Failed to configure kdump")
    }

    /// Enable the kdump service on the target system.
    pub fn install(&self) -> Result<(), KdumpError> {
        if !self.addon_active() {
            return Ok(());
        }

        engine::run_tasks(
            &self.ctx,
            self.settings
                .install_with_tasks(Box::new(SystemctlServiceManager)),
        )
        .message("Failed to install kdump")
    }

    fn addon_active(&self) -> bool {
        if !self.ctx.config.require_kernel_flag {
            return true;
        }

        let requested = cmdline::addon_requested(&self.ctx.config.host_root).unwrap_or_else(|e| {
            warn!("{e:#}");
            false
        });
        if !requested {
            info!("The kdump add-on is not enabled on the kernel command line. Skipping.");
        }
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs, path::PathBuf};

    use indoc::indoc;

    use kdump_api::{
        config::KdumpConfiguration,
        error::{ErrorKind, InvalidInputError},
    };
    use tempfile::TempDir;

    use crate::engine::resolver::ResolutionSource;

    fn sysroot(cmdline: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let grub = dir.path().join("etc/default/grub");
        fs::create_dir_all(grub.parent().unwrap()).unwrap();
        fs::write(
            &grub,
            format!("GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"{cmdline}\"\n"),
        )
        .unwrap();
        (dir, grub)
    }

    fn manual(enabled: bool, mb: u64) -> KdumpConfiguration {
        KdumpConfiguration {
            enabled,
            fadump: false,
            reserved_memory: ReservedMemory::Megabytes(mb),
        }
    }

    #[test]
    fn test_settings_follow_configuration() {
        let kdumpcfg =
            Kdumpcfg::from_context(EngineContext::default().with_kdump(manual(true, 256)));
        assert!(kdumpcfg.settings().kdump_enabled());
        assert_eq!(
            kdumpcfg.settings().reserved_memory(),
            ReservedMemory::Megabytes(256)
        );
        assert_eq!(kdumpcfg.bounds().to_string(), "160 - 3584 MB");
        assert_eq!(kdumpcfg.requirements().len(), 1);
    }

    #[test]
    fn test_validate() {
        let kdumpcfg = Kdumpcfg::from_context(EngineContext::default());
        assert_eq!(kdumpcfg.validate("auto").unwrap(), ReservedMemory::Auto);
        assert_eq!(kdumpcfg.validate("512M").unwrap().to_string(), "512M");
        assert!(matches!(
            kdumpcfg.validate("4000").unwrap_err().kind(),
            ErrorKind::InvalidInput(InvalidInputError::InvalidReservation { .. })
        ));
    }

    #[test]
    fn test_resolve_falls_back_to_auto() {
        let kdumpcfg = Kdumpcfg::from_context(EngineContext::default());
        let resolution = kdumpcfg.resolve(None);
        assert_eq!(resolution.argument, "crashkernel=auto");
        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn test_configure_manual() {
        let (dir, grub) = sysroot("rhgb quiet crashkernel=auto");
        let kdumpcfg = Kdumpcfg::from_context(
            EngineContext::default()
                .with_sysroot(dir.path())
                .with_kdump(manual(true, 256)),
        );
        kdumpcfg.configure().unwrap();
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"rhgb quiet crashkernel=256M\"\n"
        );

        // A second pass leaves the file as it is.
        kdumpcfg.reset();
        kdumpcfg.configure().unwrap();
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"rhgb quiet crashkernel=256M\"\n"
        );
    }

    #[test]
    fn test_configure_auto_from_installed_kernel() {
        let (dir, grub) = sysroot("quiet");
        let default = dir
            .path()
            .join("usr/lib/modules/6.5.6-300.fc39.x86_64/crashkernel.default");
        fs::create_dir_all(default.parent().unwrap()).unwrap();
        fs::write(&default, "crashkernel=1G-4G:192M,4G-64G:256M\n").unwrap();

        let kdumpcfg = Kdumpcfg::from_context(
            EngineContext::default()
                .with_sysroot(dir.path())
                .with_installed_kernels(&["6.5.6-300.fc39.x86_64"])
                .with_kdump(KdumpConfiguration {
                    enabled: true,
                    ..Default::default()
                }),
        );
        kdumpcfg.configure().unwrap();
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"quiet crashkernel=1G-4G:192M,4G-64G:256M\"\n"
        );
    }

    #[test]
    fn test_configure_keeps_commented_arguments() {
        let (dir, grub) = sysroot("");
        fs::write(
            &grub,
            "GRUB_CMDLINE_LINUX=\"rhgb quiet resume=/dev/sda2\" # resume device\n",
        )
        .unwrap();
        let kdumpcfg = Kdumpcfg::from_context(
            EngineContext::default()
                .with_sysroot(dir.path())
                .with_kdump(manual(true, 256)),
        );
        kdumpcfg.configure().unwrap();
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_CMDLINE_LINUX=\"rhgb quiet resume=/dev/sda2 crashkernel=256M\" # resume device\n"
        );
    }

    #[test]
    fn test_configure_rejects_out_of_range() {
        let (dir, grub) = sysroot("quiet");
        let kdumpcfg = Kdumpcfg::from_context(
            EngineContext::default()
                .with_sysroot(dir.path())
                .with_kdump(manual(true, 64)),
        );
        let error = kdumpcfg.configure().unwrap_err();
        assert!(matches!(
            error.kind(),
            ErrorKind::InvalidInput(InvalidInputError::InvalidReservation { .. })
        ));
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"quiet\"\n"
        );
    }

    #[test]
    fn test_configure_requires_kernel_flag() {
        let (dir, grub) = sysroot("quiet");
        let host = tempfile::tempdir().unwrap();
        let mut ctx = EngineContext::default()
            .with_sysroot(dir.path())
            .with_host_root(host.path())
            .with_kdump(manual(true, 256));
        ctx.config.require_kernel_flag = true;
        let kdumpcfg = Kdumpcfg::from_context(ctx);

        // No command line at all counts as not requested.
        kdumpcfg.configure().unwrap();
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"quiet\"\n"
        );

        fs::create_dir_all(host.path().join("proc")).unwrap();
        fs::write(host.path().join("proc/cmdline"), "quiet kdump_addon\n").unwrap();
        kdumpcfg.configure().unwrap();
        assert_eq!(
            fs::read_to_string(&grub).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"quiet crashkernel=256M\"\n"
        );
    }

    #[test]
    fn test_configure_missing_grub_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let kdumpcfg = Kdumpcfg::from_context(
            EngineContext::default()
                .with_sysroot(dir.path())
                .with_kdump(manual(true, 256)),
        );
        let error = kdumpcfg.configure().unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Configuration(_)));
    }

    #[test]
    fn test_install_disabled() {
        let kdumpcfg = Kdumpcfg::from_context(EngineContext::default());
        kdumpcfg.install().unwrap();
    }

    #[test]
    fn test_load_kickstart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ks.cfg");
        fs::write(
            &path,
            indoc! {"
                lang en_US.UTF-8
                %addon com_redhat_kdump --enable --reserve-mb='256M'
                %end
            "},
        )
        .unwrap();
        let data = load_kickstart(&path).unwrap();
        assert!(data.enabled);
        assert_eq!(data.reserve_mb, ReservedMemory::Megabytes(256));

        fs::write(
            &path,
            indoc! {"
                %addon com_redhat_kdump --enable --reserve-mb=invalid
                %end
            "},
        )
        .unwrap();
        assert_eq!(
            load_kickstart(&path).unwrap_err().kind(),
            &ErrorKind::InvalidInput(InvalidInputError::ParseKickstart)
        );

        assert!(matches!(
            load_kickstart(dir.path().join("missing.cfg"))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput(InvalidInputError::LoadKickstart { .. })
        ));
    }
}
