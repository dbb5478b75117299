// src/cli/handlers/config.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::AppContext,
    core::{config_loader, paths},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Prints the effective configuration and where it was loaded from."
)]
struct ConfigArgs {}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let _config_args = ConfigArgs::try_parse_from(&args)?;

    // Outside a project the global file or the defaults still apply.
    let root = paths::find_project_root(&ctx.cwd).ok();
    let (config, source) = config_loader::load(root.as_deref())?;

    println!("{} {}", "→".blue(), source);
    print!("{}", config_loader::to_toml(&config)?);
    Ok(())
}
