use std::str::FromStr;

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::IntoStaticStr;

/// System architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum SystemArchitecture {
    /// 64-bit x86
    #[strum(serialize = "x86_64")]
    Amd64,

    /// 64-bit ARM
    #[strum(serialize = "aarch64")]
    Aarch64,

    /// 64-bit PowerPC, big endian
    #[strum(serialize = "ppc64")]
    Ppc64,

    /// 64-bit PowerPC, little endian
    #[strum(serialize = "ppc64le")]
    Ppc64le,

    /// IBM Z
    #[strum(serialize = "s390x")]
    S390x,

    /// Anything else
    #[strum(serialize = "other")]
    Other,
}

impl SystemArchitecture {
    /// Get the current system architecture
    pub const fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            SystemArchitecture::Amd64
        } else if cfg!(target_arch = "aarch64") {
            SystemArchitecture::Aarch64
        } else if cfg!(all(target_arch = "powerpc64", target_endian = "little")) {
            SystemArchitecture::Ppc64le
        } else if cfg!(target_arch = "powerpc64") {
            SystemArchitecture::Ppc64
        } else if cfg!(target_arch = "s390x") {
            SystemArchitecture::S390x
        } else {
            SystemArchitecture::Other
        }
    }

    /// Whether this is one of the 64-bit PowerPC flavors, the only platforms
    /// where firmware-assisted dump exists.
    pub fn is_powerpc(&self) -> bool {
        matches!(self, SystemArchitecture::Ppc64 | SystemArchitecture::Ppc64le)
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for SystemArchitecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SystemArchitecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "x64" | "amd64" | "x86_64" => SystemArchitecture::Amd64,
            "arm64" | "aarch64" => SystemArchitecture::Aarch64,
            "ppc64" => SystemArchitecture::Ppc64,
            "ppc64le" => SystemArchitecture::Ppc64le,
            "s390x" => SystemArchitecture::S390x,
            arch => return Err(format!("unknown system architecture '{arch}'")),
        })
    }
}

impl<'de> Deserialize<'de> for SystemArchitecture {
    fn deserialize<D>(deserializer: D) -> Result<SystemArchitecture, D::Error>
    where
        D: Deserializer<'de>,
    {
        SystemArchitecture::from_str(&String::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

impl Serialize for SystemArchitecture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(
            SystemArchitecture::from_str("x86_64").unwrap(),
            SystemArchitecture::Amd64
        );
        assert_eq!(
            SystemArchitecture::from_str("AMD64").unwrap(),
            SystemArchitecture::Amd64
        );
        assert_eq!(
            SystemArchitecture::from_str("arm64").unwrap(),
            SystemArchitecture::Aarch64
        );
        assert_eq!(
            SystemArchitecture::from_str("ppc64le").unwrap(),
            SystemArchitecture::Ppc64le
        );
        assert_eq!(
            SystemArchitecture::from_str("riscv64").unwrap_err(),
            "unknown system architecture 'riscv64'"
        );
    }

    #[test]
    fn test_serde() {
        let arch: SystemArchitecture = serde_yaml::from_str("ppc64").unwrap();
        assert_eq!(arch, SystemArchitecture::Ppc64);
        assert!(arch.is_powerpc());
        assert_eq!(serde_yaml::to_string(&arch).unwrap().trim(), "ppc64");

        serde_yaml::from_str::<SystemArchitecture>("sparc").unwrap_err();
    }
}
