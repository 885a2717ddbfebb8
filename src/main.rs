mod cli;
mod commands;
mod config;
mod engine;
mod mapping;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Mode};
use commands::RunStatus;
use config::Config;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match run(&ctx, &cli) {
        Ok(status) => status.into(),
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(ctx: &Context, cli: &Cli) -> Result<RunStatus> {
    let config = Config::load(cli.config.as_deref())?;
    log::debug!(
        "{} mapping rules, drives [{}], ledger {}",
        config.mapping.rules().len(),
        config.drives.join(", "),
        config.ledger_path.display()
    );

    match cli.mode() {
        Mode::Upload => commands::upload::run(ctx, &config, cli.dry_run),
        Mode::Cleanup => commands::cleanup::run(ctx, &config, cli.dry_run),
        Mode::Status => commands::status::run(ctx, &config),
    }
}
