// src/cli/handlers/info.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use super::commons;
use crate::{
    cli::AppContext,
    models::{Command, CommandRef},
};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Shows everything a command declares."
)]
struct InfoArgs {
    /// The command to describe.
    command: String,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let info_args = InfoArgs::try_parse_from(&args)?;
    let workspace = commons::open_workspace(ctx)?;
    let command = workspace
        .resolve(&info_args.command)
        .with_context(|| format!("Could not load command '{}'", info_args.command))?;

    print_metadata(&command);
    print_arguments(&command);
    print_references("Chain", &command.chain, " -> ");
    print_references("Dependencies", &command.dependencies, ", ");
    if !command.outputs.is_empty() {
        println!("  {:<15} {}", "Outputs".blue(), command.outputs.join(", "));
    }
    if !command.manual.is_empty() {
        println!("\n{}", command.manual);
    }

    println!("\n---------------------------------");
    Ok(())
}

fn print_metadata(command: &Command) {
    println!("\n--- Command '{}' ---", command.name.yellow());
    println!(
        "  {:<15} {}",
        "Source".blue(),
        commons::describe_source(command)
    );
    println!("  {:<15} {}", "Language".blue(), command.language);
    if !command.help.is_empty() {
        println!("  {:<15} {}", "Help".blue(), command.help);
    }
    if !command.description.is_empty() {
        println!("  {:<15} {}", "Description".blue(), command.description);
    }

    let mut flags = Vec::new();
    if command.is_async {
        flags.push("async");
    }
    if command.build_number {
        flags.push("build-number");
    }
    if !flags.is_empty() {
        println!("  {:<15} {}", "Flags".blue(), flags.join(", "));
    }
}

fn print_arguments(command: &Command) {
    if command.arguments.is_empty() {
        return;
    }
    println!("  {}", "Arguments".blue());
    for arg in &command.arguments {
        let kind = if arg.optional { "optional" } else { "required" };
        match &arg.default_value {
            Some(default) => println!(
                "    {} {} ({}, default {})",
                arg.name.cyan(),
                arg.arg_type,
                kind,
                default
            ),
            None => println!("    {} {} ({})", arg.name.cyan(), arg.arg_type, kind),
        }
    }
}

fn print_references(label: &str, refs: &[CommandRef], separator: &str) {
    if refs.is_empty() {
        return;
    }
    let rendered: Vec<String> = refs.iter().map(ToString::to_string).collect();
    println!("  {:<15} {}", label.blue(), rendered.join(separator));
}
