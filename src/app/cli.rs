//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Click Debounce - Suppress accidental double clicks system-wide
#[derive(Parser, Debug)]
#[command(name = "click-debounce")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the filter against the system mouse
    Run {
        /// Debounce threshold in milliseconds (defaults to the configured value)
        #[arg(short, long)]
        threshold: Option<u64>,

        /// Stop after this many seconds (0 = until Ctrl+C)
        #[arg(short, long, default_value = "0")]
        duration: u64,
    },

    /// Feed click timestamps through the filter and print each decision
    Simulate {
        /// Debounce threshold in milliseconds (defaults to the configured value)
        #[arg(short, long)]
        threshold: Option<u64>,

        /// Click times in milliseconds, in order
        #[arg(required = true)]
        clicks: Vec<u64>,
    },

    /// Manage launch at login
    Autostart {
        #[command(subcommand)]
        action: AutostartAction,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Autostart subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutostartAction {
    /// Show whether launch at login is enabled
    Status,
    /// Launch the filter at login
    Enable,
    /// Stop launching the filter at login
    Disable,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Config file to use: the `--config` flag or the default location
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::app::config::Config::default_path)
    }
}
