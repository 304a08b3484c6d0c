//! Mozmill Automation - test-run driver for application builds
//!
//! Runs a Mozmill test-suite against one or more Firefox or Thunderbird
//! builds, one build at a time.
//!
//! ## Features
//!
//! - Installers (`.bz2`, `.dmg`, `.exe`, `.zip`), installed application folders,
//!   and folders full of installers
//! - Test-suite repository cloned once per run and switched to the branch
//!   matching each build's source repository
//! - Standard and restart Mozmill runners
//! - Per-binary report, stored for later inspection (Table, JSON, CSV)
//!
//! ## Usage
//!
//! ```bash
//! # Test a release installer and a nightly folder
//! mozmill-automation run firefox-3.6.tar.bz2 /builds/nightly/firefox
//!
//! # Restart tests, reporting to a server
//! mozmill-automation run --mode restart --report http://reports.example.com/db /builds
//!
//! # Show what a run would test
//! mozmill-automation list /builds
//!
//! # Inspect stored reports
//! mozmill-automation results list
//! mozmill-automation results show latest
//! mozmill-automation results delete <run-id>
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

mod build;
mod cli;
mod config;
mod error;
mod executor;
mod models;
mod output;
mod repository;
mod resolver;
mod results;
mod runner;
mod utils;

use build::{ArchiveInstaller, BuildProvisioner};
use cli::Args;
use config::{AppConfig, EnvConfig};
use executor::{RunConfiguration, TestRun};
use output::{OutputFormat, ReportFormatter};
use repository::VcsKind;
use resolver::BinaryResolver;
use results::{ExportFormat, ReportStorage, StoredRun};
use runner::{adapter_for, RunnerMode, RunnerOptions};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = LogLevel::resolve(
        args.verbose,
        args.log_level.as_deref().or(env.log_level.as_deref()),
    );
    init_logger(level);

    let config_path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let (mut config, source) = config::load_config(config_path.as_deref())?;
    config.apply_env(&env)?;
    if let Some(path) = &source {
        debug!("Using configuration from {}", path.display());
    }

    match args.command {
        cli::Command::Run(run_args) => {
            run_tests(run_args, config).await?;
        }
        cli::Command::List(list_args) => {
            list_binaries(list_args, &config)?;
        }
        cli::Command::Results(results_args) => {
            show_results(results_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &config, source.as_deref(), &env)?;
        }
    }

    Ok(())
}

async fn run_tests(args: cli::RunArgs, mut config: AppConfig) -> Result<()> {
    if let Some(url) = args.repository {
        config.repository.url = url;
    }
    if let Some(vcs) = &args.vcs {
        config.repository.vcs = VcsKind::from_str(vcs)
            .ok_or_else(|| anyhow::anyhow!("Unknown version control system: {vcs}"))?;
    }
    if let Some(test_path) = args.test_path {
        config.repository.test_path = test_path;
    }
    if args.report.is_some() {
        config.report_url = args.report;
    }
    if let Some(mode) = &args.mode {
        config.runner.mode = RunnerMode::from_str(mode)
            .ok_or_else(|| anyhow::anyhow!("Unknown runner mode: {mode}"))?;
    }
    config.validate()?;

    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;

    let layout = config.layout();
    let binaries = BinaryResolver::new(layout.clone()).resolve(&args.binaries)?;

    info!(
        "Testing {} binaries against {} ({} runner)",
        binaries.len(),
        config.repository.url,
        config.runner.mode
    );

    let run_config = RunConfiguration::new(binaries)
        .repository_url(config.repository.url.clone())
        .test_path(config.repository.test_path.clone())
        .report_url(config.report_url.clone())
        .runner_options(runner_options(&config, args.runner))
        .branch_convention(config.branch_convention())
        .temp_root(config.temp_dir.clone())
        .timeouts(config.timeouts());

    let builds = BuildProvisioner::new(Arc::new(ArchiveInstaller::new(layout.clone())), layout);
    let adapter = adapter_for(
        config.runner.mode,
        &config.runner.command,
        &config.runner.restart_command,
    );

    let mut run = TestRun::new(run_config, config.repository.vcs.client(), builds, adapter);
    let report = run.run().await?;

    let formatter = ReportFormatter::new(format);
    println!("{}", formatter.format_report(&report));

    if let Some(path) = &args.output {
        output::write_report_to_file(path, &report, format)?;
        info!("Report written to {path}");
    }

    if !args.no_save {
        let storage = ReportStorage::default_dir();
        let stored = StoredRun::new(report.clone());
        storage.save(&stored)?;
        println!("Stored as test-run {}", stored.id);
    }

    if !report.is_all_passed() {
        anyhow::bail!("{} of {} binaries failed", report.failed, report.total);
    }

    Ok(())
}

/// Configured runner options with command-line flags applied on top
fn runner_options(config: &AppConfig, args: cli::RunnerArgs) -> RunnerOptions {
    let mut options = config.runner_options();

    options.debug |= args.debug;
    options.shell |= args.shell;
    options.show_all |= args.show_all;
    options.show_errors |= args.show_errors;
    options.use_code |= args.usecode;
    options.addons.extend(args.addons);

    if args.logfile.is_some() {
        options.log_file = args.logfile;
    }
    if args.port.is_some() {
        options.port = args.port;
    }
    if args.profile.is_some() {
        options.set_profile(args.profile);
    }

    options
}

fn list_binaries(args: cli::ListArgs, config: &AppConfig) -> Result<()> {
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;

    let binaries = BinaryResolver::new(config.layout()).resolve(&args.paths)?;
    println!("{}", ReportFormatter::new(format).format_binaries(&binaries));
    Ok(())
}

fn load_stored(storage: &ReportStorage, id: &str) -> Result<StoredRun> {
    if id == "latest" {
        storage
            .latest()?
            .ok_or_else(|| anyhow::anyhow!("No stored test-runs"))
    } else {
        storage.load(id)
    }
}

fn show_results(args: cli::ResultsArgs) -> Result<()> {
    let storage = ReportStorage::default_dir();

    match args.action {
        cli::ResultsAction::List => {
            let runs = storage.list()?;
            if runs.is_empty() {
                println!("\n📭 No stored test-runs found in {}.", storage.base_dir().display());
                println!("   Run tests with: mozmill-automation run <binaries>");
                return Ok(());
            }

            println!("\n┌──────────────────────┬──────────┬───────┬────────┬──────────────────────┐");
            println!("│ Run ID               │ Mode     │ Total │ Failed │ Started              │");
            println!("├──────────────────────┼──────────┼───────┼────────┼──────────────────────┤");
            for run in &runs {
                println!(
                    "│ {:20} │ {:8} │ {:5} │ {:6} │ {:20} │",
                    run.id,
                    run.mode,
                    run.total,
                    run.failed,
                    run.started_at.format("%Y-%m-%d %H:%M:%S").to_string()
                );
            }
            println!("└──────────────────────┴──────────┴───────┴────────┴──────────────────────┘");
        }

        cli::ResultsAction::Show { id, format } => {
            let format = OutputFormat::from_str(&format)
                .ok_or_else(|| anyhow::anyhow!("Unknown output format: {format}"))?;
            let run = load_stored(&storage, &id)?;

            println!("Test-run {} ({} {})", run.id, run.environment.os, run.environment.arch);
            println!("{}", ReportFormatter::new(format).format_report(&run.report));
        }

        cli::ResultsAction::Export { id, file } => {
            let format = ExportFormat::from_extension(&file).ok_or_else(|| {
                anyhow::anyhow!("Unsupported export file: {} (use .json or .csv)", file.display())
            })?;
            let run = load_stored(&storage, &id)?;

            storage.export(&run, &file, format)?;
            println!("✓ Exported test-run {} to {}", run.id, file.display());
        }

        cli::ResultsAction::Delete { id } => {
            storage.load(&id)?;
            storage.delete(&id)?;
            println!("✓ Deleted test-run {id}");
        }
    }

    Ok(())
}

fn manage_config(
    args: cli::ConfigArgs,
    config: &AppConfig,
    source: Option<&Path>,
    env: &EnvConfig,
) -> Result<()> {
    match args.action {
        cli::ConfigAction::Show => {
            match source {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No configuration file found, using defaults"),
            }
            let output = serde_yaml::to_string(config).context("Failed to serialize config")?;
            println!("{output}");
        }

        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            AppConfig::default().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
            if env.has_any() {
                println!();
                env.print_summary();
            }
        }
    }

    Ok(())
}
