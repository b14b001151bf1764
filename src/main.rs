use std::{
    panic::{self, AssertUnwindSafe},
    path::Path,
    process::ExitCode,
};

use anyhow::{Context, Error};
use clap::Parser;
use log::{debug, error, info};
use serde::Serialize;

use kdump_api::{
    config::AgentConfiguration,
    constants::AGENT_CONFIG_PATH,
    error::{InternalError, KdumpError, KdumpResultExt, ReportError},
};
use kdumpcfg::{
    cli::{Cli, Commands},
    Kdumpcfg,
};

fn load_agent_config(path: &Path) -> Result<AgentConfiguration, KdumpError> {
    if !path.exists() && path == Path::new(AGENT_CONFIG_PATH) {
        debug!("No configuration at '{}', using defaults", path.display());
        return Ok(AgentConfiguration::default());
    }

    AgentConfiguration::load(path).message(format!(
        "Failed to load configuration from '{}'",
        path.display()
    ))
}

fn print_yaml(value: &impl Serialize) -> Result<(), KdumpError> {
    let output = serde_yaml::to_string(value).structured(InternalError::SerializeOutput)?;
    print!("{output}");
    Ok(())
}

fn run_kdumpcfg(args: &Cli) -> Result<(), KdumpError> {
    // Log version ASAP
    info!("kdumpcfg version: {}", kdumpcfg::KDUMPCFG_VERSION);

    // Kickstart parsing needs no machine state
    if let Commands::Kickstart { file } = &args.command {
        let data = kdumpcfg::load_kickstart(file)?;
        print!("{data}");
        return Ok(());
    }

    let config = load_agent_config(&args.config)?;
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        let kdumpcfg = match args.command.kickstart() {
            Some(kickstart) => Kdumpcfg::with_kickstart(config, kickstart)?,
            None => Kdumpcfg::new(config),
        };

        match &args.command {
            Commands::Bounds => print_yaml(&kdumpcfg.bounds()),
            Commands::Validate { value } => {
                let reserved = kdumpcfg.validate(value)?;
                print_yaml(&reserved)
            }
            Commands::Resolve { mode } => {
                print_yaml(&kdumpcfg.resolve(mode.map(Into::into)))
            }
            Commands::Configure { .. } => kdumpcfg.configure(),
            Commands::Install { .. } => kdumpcfg.install(),
            Commands::Requirements { .. } => print_yaml(&kdumpcfg.requirements()),
            Commands::Kickstart { .. } => Err(KdumpError::internal("Invalid command")),
        }
        .message(format!("Failed to execute '{}' command", args.command))
    }));

    match res {
        Err(e) => Err(KdumpError::new(InternalError::Panic(format!("{e:?}")))),
        Ok(r) => r,
    }
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(args.verbosity)
        .try_init()
        .context("Logger already registered")
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the logger
    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    // Invoke kdumpcfg
    if let Err(e) = run_kdumpcfg(&args) {
        error!("kdumpcfg failed: {e:?}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
