use log::debug;

use kdump_api::{
    config::{DumpMode, KdumpConfiguration, ReservedMemory},
    constants::{CRASHKERNEL_KEY, FADUMP_KEY, FADUMP_ON_ARGUMENT},
};

/// Boot argument keys owned by the dump configuration.
const MANAGED_KEYS: &[&str] = &[CRASHKERNEL_KEY, FADUMP_KEY];

fn key(argument: &str) -> &str {
    argument
        .split_once('=')
        .map_or(argument, |(key, _)| key)
}

/// The dump mode the crash kernel is reserved for.
pub fn dump_mode(fadump_requested: bool, fadump_capable: bool) -> DumpMode {
    if fadump_requested && fadump_capable {
        DumpMode::Fadump
    } else {
        DumpMode::Kdump
    }
}

/// Rewrite `args` so the dump arguments match `desired`.
///
/// Existing `crashkernel` and `fadump` entries are dropped, `fadump=on` is
/// appended when requested on a capable platform, then the reservation when
/// kdump is enabled. Other arguments keep their relative order. An automatic
/// reservation is turned into a literal argument by `resolve_auto`, which is
/// only called when needed.
pub fn apply(
    args: &[String],
    desired: &KdumpConfiguration,
    fadump_capable: bool,
    resolve_auto: impl FnOnce(DumpMode) -> String,
) -> Vec<String> {
    let mut result: Vec<String> = args
        .iter()
        .filter(|arg| {
            let managed = MANAGED_KEYS.contains(&key(arg));
            if managed {
                debug!("Removing boot argument '{arg}'");
            }
            !managed
        })
        .cloned()
        .collect();

    if desired.fadump && fadump_capable {
        result.push(FADUMP_ON_ARGUMENT.into());
    }

    if desired.enabled {
        let crashkernel = match desired.reserved_memory {
            ReservedMemory::Auto => resolve_auto(dump_mode(desired.fadump, fadump_capable)),
            reserved @ ReservedMemory::Megabytes(_) => format!("{CRASHKERNEL_KEY}={reserved}"),
        };
        result.push(crashkernel);
    }

    debug!("Boot arguments: {}", result.join(" "));
    result
}
