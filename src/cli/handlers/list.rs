// src/cli/handlers/list.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::cli::AppContext;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the commands of the project.")]
struct ListArgs {
    /// Print names only, one per line.
    #[arg(long, short)]
    names: bool,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let list_args = ListArgs::try_parse_from(&args)?;
    let workspace = commons::open_workspace(ctx)?;
    let report = commons::discover(&workspace)?;
    let commands = workspace.registry().commands();

    if list_args.names {
        for command in &commands {
            println!("{}", command.name);
        }
        return Ok(());
    }

    if commands.is_empty() {
        println!("No commands found in '{}'.", workspace.root().display());
        return Ok(());
    }

    println!("\n{} {}", "Commands in".bold(), workspace.root().display());
    let width = commands.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for command in &commands {
        let mut line = format!("  {}", format!("{:<width$}", command.name).cyan());
        let arguments = commons::format_arguments(command);
        if !arguments.is_empty() {
            line.push_str(&format!("  {}", arguments.dimmed()));
        }
        if !command.help.is_empty() {
            line.push_str(&format!("  {}", command.help));
        }
        println!("{}", line);
    }

    for name in &report.shadowed {
        println!(
            "\n{} '{}' is also a built-in; use 'stoke run {}'.",
            "note:".yellow(),
            name,
            name
        );
    }
    if !report.failed.is_empty() {
        println!(
            "\n{} {} command(s) could not be loaded; see the warnings above.",
            "warning:".yellow(),
            report.failed.len()
        );
    }
    Ok(())
}
