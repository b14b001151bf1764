mod configuration;
mod installation;

pub use configuration::KdumpConfigurationTask;
pub use installation::{KdumpInstallationTask, ServiceManager, SystemctlServiceManager};
