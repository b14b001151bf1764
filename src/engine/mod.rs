use log::info;

use kdump_api::error::{KdumpError, KdumpResultExt};

// Engine functionality
pub mod bootargs;
pub mod bootloader;
pub mod bounds;
mod context;
pub mod probe;
pub mod resolver;
pub mod validator;

pub use context::EngineContext;

/// One step of bringing the target system's dump setup in line with the
/// settings.
pub trait Task {
    fn name(&self) -> &'static str;

    fn run(&mut self, ctx: &EngineContext) -> Result<(), KdumpError>;
}

/// Run tasks in order, stopping at the first failure.
pub fn run_tasks(ctx: &EngineContext, tasks: Vec<Box<dyn Task>>) -> Result<(), KdumpError> {
    for mut task in tasks {
        info!("Running task: {}", task.name());
        task.run(ctx)
            .message(format!("Task '{}' failed", task.name()))?;
    }
    Ok(())
}
