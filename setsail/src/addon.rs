use std::fmt::{Display, Formatter, Result as FmtResult};

use kdump_api::{config::ReservedMemory, constants::KICKSTART_ADDON_NAME};

/// Contents of the `%addon com_redhat_kdump` kickstart section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KdumpAddonData {
    pub enabled: bool,
    pub reserve_mb: ReservedMemory,
    pub enablefadump: bool,
}

impl Display for KdumpAddonData {
    /// Kickstart representation of the section.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "%addon {KICKSTART_ADDON_NAME}")?;

        if self.enabled {
            write!(f, " --enable --reserve-mb='{}'", self.reserve_mb.bare())?;
        } else {
            f.write_str(" --disable")?;
        }

        if self.enablefadump {
            f.write_str(" --enablefadump")?;
        }

        f.write_str("\n\n%end\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use indoc::indoc;

    #[test]
    fn test_display_default() {
        assert_eq!(
            KdumpAddonData::default().to_string(),
            indoc! {"
                %addon com_redhat_kdump --disable

                %end
            "}
        );
    }

    #[test]
    fn test_display_enabled() {
        let data = KdumpAddonData {
            enabled: true,
            reserve_mb: ReservedMemory::Megabytes(256),
            enablefadump: false,
        };
        assert_eq!(
            data.to_string(),
            "%addon com_redhat_kdump --enable --reserve-mb='256'\n\n%end\n"
        );

        let data = KdumpAddonData {
            enabled: true,
            reserve_mb: ReservedMemory::Auto,
            enablefadump: true,
        };
        assert_eq!(
            data.to_string(),
            "%addon com_redhat_kdump --enable --reserve-mb='auto' --enablefadump\n\n%end\n"
        );
    }

    #[test]
    fn test_display_disabled_hides_reservation() {
        let data = KdumpAddonData {
            enabled: false,
            reserve_mb: ReservedMemory::Megabytes(512),
            enablefadump: true,
        };
        assert_eq!(
            data.to_string(),
            "%addon com_redhat_kdump --disable --enablefadump\n\n%end\n"
        );
    }
}
