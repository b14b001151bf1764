use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use kdump_api::{config::DumpMode, constants::AGENT_CONFIG_PATH};

use crate::KDUMPCFG_VERSION;

#[derive(Parser, Debug)]
#[clap(version = KDUMPCFG_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Debug)]
    pub verbosity: LevelFilter,

    /// Agent configuration file. Built-in defaults are used when the default
    /// path does not exist.
    #[arg(global = true, short, long, default_value = AGENT_CONFIG_PATH)]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Dump mode to resolve the default reservation for
#[derive(clap::ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Kdump,
    Fadump,
}

impl From<Mode> for DumpMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Kdump => DumpMode::Kdump,
            Mode::Fadump => DumpMode::Fadump,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the reservation bounds of this machine
    Bounds,

    /// Check a reservation ("auto", "<N>" or "<N>M") against the bounds
    Validate {
        #[clap(index = 1)]
        value: String,
    },

    /// Resolve the automatic reservation into a crashkernel argument
    Resolve {
        /// Dump mode, follows the fadump setting when omitted
        #[clap(long, value_enum)]
        mode: Option<Mode>,
    },

    /// Write the crash kernel arguments into the bootloader defaults
    Configure {
        /// Kickstart whose kdump add-on section replaces the configured state
        #[clap(short, long)]
        kickstart: Option<PathBuf>,
    },

    /// Enable the kdump service on the target system
    Install {
        /// Kickstart whose kdump add-on section replaces the configured state
        #[clap(short, long)]
        kickstart: Option<PathBuf>,
    },

    /// Print the packages the target system needs
    Requirements {
        /// Kickstart whose kdump add-on section replaces the configured state
        #[clap(short, long)]
        kickstart: Option<PathBuf>,
    },

    /// Parse a kickstart and print its normalized kdump add-on section
    Kickstart {
        #[clap(index = 1)]
        file: PathBuf,
    },
}

impl Commands {
    /// Kickstart overriding the configured kdump state, if any.
    pub fn kickstart(&self) -> Option<&PathBuf> {
        match self {
            Commands::Configure { kickstart }
            | Commands::Install { kickstart }
            | Commands::Requirements { kickstart } => kickstart.as_ref(),
            _ => None,
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Commands::Bounds => write!(f, "bounds"),
            Commands::Validate { .. } => write!(f, "validate"),
            Commands::Resolve { .. } => write!(f, "resolve"),
            Commands::Configure { .. } => write!(f, "configure"),
            Commands::Install { .. } => write!(f, "install"),
            Commands::Requirements { .. } => write!(f, "requirements"),
            Commands::Kickstart { .. } => write!(f, "kickstart"),
        }
    }
}
