// src/bin/stoke.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::env;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use stoke::{
    cli::{AppContext, Cli, dispatcher},
    constants::INTERRUPTED_EXIT_CODE,
    core::{config_loader, paths},
    system::{processes::ProcessTable, signals},
};

/// Sets up logging and signal handling, dispatches, and turns errors into an
/// exit status.
fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        if dispatcher::is_interrupted(&e) {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let cwd = env::current_dir().context("Could not read the current directory")?;

    // The config decides the log level, so it is read before anything logs.
    // A broken config file is reported again by the handler that needs it.
    let config = paths::find_project_root(&cwd)
        .ok()
        .and_then(|root| config_loader::load(Some(root.as_path())).ok())
        .or_else(|| config_loader::load(None).ok())
        .map(|(config, _)| config)
        .unwrap_or_default();
    init_logger(config.debug);
    config_loader::apply(&config);
    log::debug!("CLI args parsed: {:?}", cli);

    let ctx = AppContext {
        processes: Arc::new(ProcessTable::new()),
        token: Arc::new(AtomicBool::new(false)),
        cwd,
    };
    signals::install(ctx.processes.clone(), ctx.token.clone())
        .context("Could not install the signal handlers")?;

    dispatcher::dispatch(cli.args, &ctx)
}

fn init_logger(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}
