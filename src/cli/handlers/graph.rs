// src/cli/handlers/graph.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use super::commons;
use crate::{cli::AppContext, core::graph_display, models::CommandRef};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Displays the chain and dependency tree of the project."
)]
struct GraphArgs {
    /// The command to use as the root of the tree. Defaults to the full graph.
    command: Option<String>,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let graph_args = GraphArgs::try_parse_from(&args)?;
    let workspace = commons::open_workspace(ctx)?;

    let (header, rendered) = match graph_args.command {
        Some(name) => {
            let command = workspace
                .resolve(&name)
                .with_context(|| format!("Could not load command '{}'", name))?;
            (
                format!("Dependency tree of '{}':", name.cyan()),
                graph_display::render_command_tree(&CommandRef::plain(command)),
            )
        }
        None => {
            commons::discover(&workspace)?;
            (
                "Command graph:".to_string(),
                graph_display::render_graph(&workspace.registry().commands()),
            )
        }
    };

    println!("\n{}", header);
    print!("{}", rendered);
    Ok(())
}
