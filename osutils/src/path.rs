use std::path::{Path, PathBuf};

fn strip_root(path: &Path) -> &Path {
    match path.strip_prefix("/") {
        Ok(relative) => relative,
        Err(_) => path,
    }
}

/// Join `path` onto `root`, treating an absolute `path` as relative to `root`.
///
/// Unlike `Path::join`, an absolute `path` does not replace `root`.
pub fn join_relative(root: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(strip_root(path.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative() {
        assert_eq!(
            join_relative("/mnt/sysimage", "/etc/default/grub"),
            Path::new("/mnt/sysimage/etc/default/grub")
        );
        assert_eq!(
            join_relative("/mnt/sysimage", "etc/default/grub"),
            Path::new("/mnt/sysimage/etc/default/grub")
        );
        assert_eq!(join_relative("/", "/proc/meminfo"), Path::new("/proc/meminfo"));
        assert_eq!(
            join_relative("/host", "/host/proc"),
            Path::new("/host/host/proc")
        );
    }
}
