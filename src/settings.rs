use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, info};
use serde::Serialize;

use kdump_api::{
    config::{KdumpConfiguration, MemoryBounds, ReservedMemory},
    constants::KEXEC_TOOLS_PACKAGE,
};
use setsail::KdumpAddonData;

use crate::{
    engine::{bootloader::BootloaderArguments, Task},
    tasks::{KdumpConfigurationTask, KdumpInstallationTask, ServiceManager},
};

/// A property of the settings store changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    KdumpEnabled(bool),
    FadumpEnabled(bool),
    ReservedMemory(ReservedMemory),
}

/// A package the target system needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub package: String,
    pub reason: String,
}

/// The kdump settings a front end edits and observes.
#[derive(Debug)]
pub struct KdumpSettings {
    kdump_enabled: bool,
    fadump_enabled: bool,
    reserved_memory: ReservedMemory,
    subscribers: Vec<Sender<SettingsChange>>,
}

impl KdumpSettings {
    /// Kdump and fadump disabled, the reservation set to the lower bound.
    pub fn new(bounds: &MemoryBounds) -> Self {
        Self {
            kdump_enabled: false,
            fadump_enabled: false,
            reserved_memory: ReservedMemory::Megabytes(bounds.lower),
            subscribers: Vec::new(),
        }
    }

    /// Receive every change made from now on.
    pub fn subscribe(&mut self) -> Receiver<SettingsChange> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    fn publish(&mut self, change: SettingsChange) {
        debug!("Settings changed: {change:?}");
        self.subscribers
            .retain(|subscriber| subscriber.send(change).is_ok());
    }

    pub fn kdump_enabled(&self) -> bool {
        self.kdump_enabled
    }

    pub fn set_kdump_enabled(&mut self, enabled: bool) {
        self.kdump_enabled = enabled;
        self.publish(SettingsChange::KdumpEnabled(enabled));
        info!("Kdump enablement is set to '{enabled}'");
    }

    pub fn fadump_enabled(&self) -> bool {
        self.fadump_enabled
    }

    pub fn set_fadump_enabled(&mut self, enabled: bool) {
        self.fadump_enabled = enabled;
        self.publish(SettingsChange::FadumpEnabled(enabled));
        info!("Fadump enablement is set to '{enabled}'");
    }

    pub fn reserved_memory(&self) -> ReservedMemory {
        self.reserved_memory
    }

    pub fn set_reserved_memory(&mut self, reserved: ReservedMemory) {
        self.reserved_memory = reserved;
        self.publish(SettingsChange::ReservedMemory(reserved));
        info!("Reserved memory is set to '{reserved}'");
    }

    /// Take over the values of a kickstart addon section.
    pub fn process_kickstart(&mut self, data: &KdumpAddonData) {
        self.set_kdump_enabled(data.enabled);
        self.set_reserved_memory(data.reserve_mb);
        self.set_fadump_enabled(data.enablefadump);
    }

    /// The addon section describing the current values.
    pub fn setup_kickstart(&self) -> KdumpAddonData {
        KdumpAddonData {
            enabled: self.kdump_enabled,
            reserve_mb: self.reserved_memory,
            enablefadump: self.fadump_enabled,
        }
    }

    pub fn apply_configuration(&mut self, config: &KdumpConfiguration) {
        self.set_kdump_enabled(config.enabled);
        self.set_reserved_memory(config.reserved_memory);
        self.set_fadump_enabled(config.fadump);
    }

    pub fn to_configuration(&self) -> KdumpConfiguration {
        KdumpConfiguration {
            enabled: self.kdump_enabled,
            fadump: self.fadump_enabled,
            reserved_memory: self.reserved_memory,
        }
    }

    /// Packages the target system needs for the current settings.
    pub fn collect_requirements(&self) -> Vec<Requirement> {
        if !self.kdump_enabled {
            return Vec::new();
        }

        vec![Requirement {
            package: KEXEC_TOOLS_PACKAGE.into(),
            reason: "Required by kdump add-on.".into(),
        }]
    }

    /// Tasks writing the dump configuration into the bootloader.
    pub fn configure_with_tasks(
        &self,
        bootloader: Box<dyn BootloaderArguments>,
    ) -> Vec<Box<dyn Task>> {
        vec![Box::new(KdumpConfigurationTask::new(
            self.to_configuration(),
            bootloader,
        ))]
    }

    /// Tasks enabling kdump on the installed system.
    pub fn install_with_tasks(&self, services: Box<dyn ServiceManager>) -> Vec<Box<dyn Task>> {
        vec![Box::new(KdumpInstallationTask::new(
            self.kdump_enabled,
            services,
        ))]
    }
}
