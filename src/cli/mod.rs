//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mozmill test-run automation
#[derive(Parser, Debug)]
#[command(name = "mozmill-automation")]
#[command(version)]
#[command(about = "Run Mozmill tests against application builds")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the test-suite against builds
    Run(RunArgs),

    /// Resolve and list the binaries a run would test
    List(ListArgs),

    /// View stored test-run reports
    Results(ResultsArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Installers, application folders, or folders of installers
    #[arg(required = true)]
    pub binaries: Vec<PathBuf>,

    /// Tests to run, relative to the repository checkout
    #[arg(short, long)]
    pub test_path: Option<PathBuf>,

    /// Report server URL
    #[arg(short, long)]
    pub report: Option<String>,

    /// Test-suite repository URL
    #[arg(long)]
    pub repository: Option<String>,

    /// Version control system of the repository (hg, git)
    #[arg(long)]
    pub vcs: Option<String>,

    /// Runner mode (standard, restart)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Write the report to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Do not store the report
    #[arg(long)]
    pub no_save: bool,

    #[command(flatten)]
    pub runner: RunnerArgs,
}

/// Options passed through to Mozmill
#[derive(Parser, Debug, Default)]
pub struct RunnerArgs {
    /// Enable the Mozmill debugger
    #[arg(long)]
    pub debug: bool,

    /// Mozmill log file
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Port for the JSBridge connection
    #[arg(long)]
    pub port: Option<u16>,

    /// Use an existing profile instead of a new one
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Start a JS shell
    #[arg(long)]
    pub shell: bool,

    /// Show all test output
    #[arg(long)]
    pub show_all: bool,

    /// Show errors only
    #[arg(long)]
    pub show_errors: bool,

    /// Run in code mode
    #[arg(long)]
    pub usecode: bool,

    /// Add-on to install into the profile (repeatable)
    #[arg(long = "addon")]
    pub addons: Vec<PathBuf>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Installers, application folders, or folders of installers
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output format (table, json, json-pretty, csv)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub action: ResultsAction,
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    /// List stored test-runs
    List,

    /// Show a stored test-run
    Show {
        /// Run ID (or "latest")
        id: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Export a stored test-run
    Export {
        /// Run ID (or "latest")
        id: String,

        /// Destination file (.json or .csv)
        file: PathBuf,
    },

    /// Delete a stored test-run
    Delete {
        /// Run ID
        id: String,
    },
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Destination file
        #[arg(default_value = "mozmill-automation.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Describe the environment variables
    Env,
}
