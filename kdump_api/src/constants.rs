use const_format::formatcp;

// Host-exposed sources read by the memory probe, relative to the host root.

/// Kernel memory statistics, `MemTotal` is reported in kB.
pub const PROC_MEMINFO_PATH: &str = "/proc/meminfo";

/// Size in bytes of the memory currently reserved for the crash kernel.
pub const KEXEC_CRASH_SIZE_PATH: &str = "/sys/kernel/kexec_crash_size";

/// Kernel command line of the running (installer) kernel.
pub const PROC_CMDLINE_PATH: &str = "/proc/cmdline";

/// Presence of this device-tree node signals firmware-assisted dump support.
pub const FADUMP_CAPABLE_FILE: &str = "/proc/device-tree/rtas/ibm,configure-kernel-dump";

// Per-kernel crashkernel defaults

/// Directory holding the modules of every installed kernel.
pub const KERNEL_MODULES_DIRECTORY: &str = "/usr/lib/modules";

/// Name of the file a kernel package ships its default crashkernel argument in.
pub const CRASHKERNEL_DEFAULT_FILENAME: &str = "crashkernel.default";

// Boot arguments

/// Boot argument key for the crash kernel reservation.
pub const CRASHKERNEL_KEY: &str = "crashkernel";

/// Boot argument key for firmware-assisted dump.
pub const FADUMP_KEY: &str = "fadump";

/// Boot argument enabling firmware-assisted dump.
pub const FADUMP_ON_ARGUMENT: &str = formatcp!("{FADUMP_KEY}=on");

/// Literal reservation handed to the kernel when no default could be resolved.
pub const CRASHKERNEL_AUTO_ARGUMENT: &str = formatcp!("{CRASHKERNEL_KEY}=auto");

/// Token requesting an automatic reservation.
pub const RESERVED_MEMORY_AUTO: &str = "auto";

/// Unit suffix of a manual reservation.
pub const RESERVED_MEMORY_UNIT: char = 'M';

// Installation

/// Service enabled on the target system when kdump is requested.
pub const KDUMP_SERVICE: &str = "kdump.service";

/// Package that must be installed on the target system when kdump is requested.
pub const KEXEC_TOOLS_PACKAGE: &str = "kexec-tools";

/// Installer kernel argument that activates the kdump add-on.
pub const KDUMP_ADDON_KERNEL_FLAG: &str = "kdump_addon";

/// Name of the kickstart add-on section.
pub const KICKSTART_ADDON_NAME: &str = "com_redhat_kdump";

// Agent configuration

/// Default path to load the agent configuration from.
pub const AGENT_CONFIG_PATH: &str = "/etc/kdumpcfg/config.yaml";

/// GRUB defaults file, relative to the sysroot.
pub const GRUB_DEFAULTS_RELATIVE_PATH: &str = "etc/default/grub";

/// Default bounded wait for external tools, in seconds.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Path of the crashkernel default file of a given kernel version, relative to
/// the root it lives under.
pub fn crashkernel_default_path(kernel_version: &str) -> String {
    format!("{KERNEL_MODULES_DIRECTORY}/{kernel_version}/{CRASHKERNEL_DEFAULT_FILENAME}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crashkernel_default_path() {
        assert_eq!(
            crashkernel_default_path("6.5.6-300.fc39.x86_64"),
            "/usr/lib/modules/6.5.6-300.fc39.x86_64/crashkernel.default"
        );
        assert_eq!(FADUMP_ON_ARGUMENT, "fadump=on");
        assert_eq!(CRASHKERNEL_AUTO_ARGUMENT, "crashkernel=auto");
    }
}
