// src/cli/mod.rs

use crate::{CancellationToken, system::processes::ProcessTable};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

pub mod dispatcher;
pub mod handlers;

/// stoke: run the scripts of a project as a graph of build commands.
///
/// Usage:
///   stoke                            list commands
///   stoke <command> [args...]        run a command
///   stoke run <command|chain> [args] run a command or a `a -> b x` chain
///   stoke list | ls                  list commands
///   stoke info <command>             show everything a command declares
///   stoke graph [command]            show the dependency tree
///   stoke init                       set up stoke/ in this directory
///   stoke config                     print the effective configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(
    disable_help_subcommand = true,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// A built-in command or the name of a project command, followed by its
    /// arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// State shared by every handler of one invocation.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub processes: Arc<ProcessTable>,
    pub token: CancellationToken,
    pub cwd: PathBuf,
}
