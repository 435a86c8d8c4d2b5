//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the benchmark matrix
    Run(RunArgs),

    /// Wait for the target's health endpoint and report readiness
    Probe {
        /// Base URL of the target (overrides configuration)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Readiness budget, e.g. 15s (overrides configuration)
        #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Base URL of the target (overrides configuration)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Comma-separated limit values, e.g. 10,100,1000
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub limits: Vec<u64>,

    /// Comma-separated requests-per-second levels, e.g. 1,10,50
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub concurrency: Vec<u32>,

    /// Attack duration per cell, e.g. 5s
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Benchmark an already-running target even if a server is configured
    #[arg(long)]
    pub attach: bool,

    /// Cancel the whole run after this long, e.g. 2m
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Write all cell reports as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Disable colored report output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Path to configuration file (optional, uses default loading logic)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}
