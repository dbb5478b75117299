// src/cli/handlers/run.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{cli::AppContext, constants::CHAIN_SEPARATOR, core::workspace::Workspace};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Runs a command, or a chain such as 'clean -> build release'."
)]
struct RunArgs {
    /// The command to run.
    target: String,

    /// Arguments for the command, positional or as name=value.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let workspace = commons::open_workspace(ctx)?;

    workspace.run_startup_hook()?;
    let result = run(&workspace, &run_args);
    let detached_failures = workspace.wait_detached();
    if let Err(e) = workspace.run_exit_hook() {
        log::warn!("{}", e);
    }
    result?;

    if detached_failures.is_empty() {
        return Ok(());
    }
    for (name, e) in &detached_failures {
        eprintln!("{} {}: {}", "✗".red(), name.cyan(), e);
    }
    Err(anyhow!(
        "{} background command(s) failed",
        detached_failures.len()
    ))
}

fn run(workspace: &Workspace, run_args: &RunArgs) -> Result<()> {
    if is_chain(&run_args.target, &run_args.args) {
        let mut chain = run_args.target.clone();
        for arg in &run_args.args {
            chain.push(' ');
            chain.push_str(arg);
        }
        log::debug!("Running chain '{}'", chain);
        workspace.run_chain_string(&chain)?;
    } else {
        workspace.run_command(&run_args.target, &run_args.args)?;
    }
    Ok(())
}

/// True when the invocation spells a chain. A separator inside the value of
/// a `name=value` argument is part of that value.
fn is_chain(target: &str, args: &[String]) -> bool {
    target.contains(CHAIN_SEPARATOR)
        || args.iter().any(|arg| {
            let label = arg.split_once('=').map_or(arg.as_str(), |(label, _)| label);
            label.contains(CHAIN_SEPARATOR)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let args = RunArgs::try_parse_from(["build", "target=linux", "-v"]).unwrap();
        assert_eq!(args.target, "build");
        assert_eq!(args.args, vec!["target=linux", "-v"]);

        assert!(RunArgs::try_parse_from(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_chain_detection() {
        let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(is_chain("clean -> build", &[]));
        assert!(is_chain("clean", &args(&["->", "build", "release"])));
        assert!(is_chain("clean", &args(&["->build"])));

        assert!(!is_chain("notify", &args(&["msg=a->b"])));
        assert!(!is_chain("notify", &args(&["level=2", "msg=x -> y"])));
        assert!(!is_chain("build", &args(&["release"])));
    }
}
