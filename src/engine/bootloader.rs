use std::path::PathBuf;

use anyhow::Error;
use log::debug;

use osutils::grub::GrubDefaults;

/// Ordered store of the extra kernel arguments the bootloader passes to the
/// installed system.
pub trait BootloaderArguments {
    fn extra_arguments(&self) -> Result<Vec<String>, Error>;

    fn set_extra_arguments(&mut self, arguments: Vec<String>) -> Result<(), Error>;
}

/// Kernel arguments kept in the GRUB defaults file of the target system.
#[derive(Debug, Clone)]
pub struct GrubDefaultsArguments {
    path: PathBuf,
}

impl GrubDefaultsArguments {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BootloaderArguments for GrubDefaultsArguments {
    fn extra_arguments(&self) -> Result<Vec<String>, Error> {
        GrubDefaults::read(&self.path)?.cmdline_arguments()
    }

    fn set_extra_arguments(&mut self, arguments: Vec<String>) -> Result<(), Error> {
        let mut defaults = GrubDefaults::read(&self.path)?;
        defaults.set_cmdline_arguments(&arguments)?;
        defaults.write()?;
        debug!("Updated kernel arguments in '{}'", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::fs;

    use anyhow::bail;

    /// In-memory store, optionally refusing writes.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryArguments {
        pub arguments: Vec<String>,
        pub reject_writes: bool,
        pub fail_reads: bool,
    }

    impl BootloaderArguments for MemoryArguments {
        fn extra_arguments(&self) -> Result<Vec<String>, Error> {
            if self.fail_reads {
                bail!("read refused");
            }
            Ok(self.arguments.clone())
        }

        fn set_extra_arguments(&mut self, arguments: Vec<String>) -> Result<(), Error> {
            if self.reject_writes {
                bail!("write refused");
            }
            self.arguments = arguments;
            Ok(())
        }
    }

    #[test]
    fn test_grub_defaults_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grub");
        fs::write(&path, "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"rhgb quiet\"\n").unwrap();

        let mut store = GrubDefaultsArguments::new(&path);
        assert_eq!(store.extra_arguments().unwrap(), vec!["rhgb", "quiet"]);

        store
            .set_extra_arguments(vec!["rhgb".into(), "crashkernel=256M".into()])
            .unwrap();
        assert_eq!(
            store.extra_arguments().unwrap(),
            vec!["rhgb", "crashkernel=256M"]
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX=\"rhgb crashkernel=256M\"\n"
        );

        GrubDefaultsArguments::new(dir.path().join("missing"))
            .extra_arguments()
            .unwrap_err();
    }
}
