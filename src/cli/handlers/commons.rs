// src/cli/handlers/commons.rs

// Helpers shared by several handlers.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::{
    cli::AppContext,
    core::{discovery::DiscoveryReport, workspace::Workspace},
    models::Command,
};

/// Opens the project that contains the working directory.
pub fn open_workspace(ctx: &AppContext) -> Result<Workspace> {
    Workspace::open(&ctx.cwd, ctx.processes.clone(), ctx.token.clone()).with_context(|| {
        format!(
            "Could not load a stoke project from '{}'. Run 'stoke init' to create one.",
            ctx.cwd.display()
        )
    })
}

/// Discovers every command and logs the ones that could not be resolved.
pub fn discover(workspace: &Workspace) -> Result<DiscoveryReport> {
    let report = workspace
        .discover()
        .context("Could not build the command graph")?;
    for (name, error) in &report.failed {
        log::warn!("Skipping '{}': {}", name, error);
    }
    Ok(report)
}

/// Renders the declared arguments, e.g. `<target:String> [mode:String=debug]`.
pub fn format_arguments(command: &Command) -> String {
    command
        .arguments
        .iter()
        .map(|arg| match &arg.default_value {
            _ if !arg.optional => format!("<{}:{}>", arg.name, arg.arg_type),
            Some(default) => format!("[{}:{}={}]", arg.name, arg.arg_type, default),
            None => format!("[{}:{}]", arg.name, arg.arg_type),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where a command comes from, for display.
pub fn describe_source(command: &Command) -> String {
    match (&command.path, &command.exec) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(_)) => "Stokefile.toml (exec)".to_string(),
        (None, None) => "-".dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArgType, CommandArgument};

    fn argument(name: &str, optional: bool, default: Option<&str>) -> CommandArgument {
        CommandArgument {
            name: name.to_string(),
            arg_type: ArgType::String,
            optional,
            default_value: default.map(str::to_string),
        }
    }

    #[test]
    fn test_format_arguments() {
        let command = Command {
            arguments: vec![
                argument("target", false, None),
                argument("mode", true, Some("debug")),
                argument("tag", true, None),
            ],
            ..Default::default()
        };
        assert_eq!(
            format_arguments(&command),
            "<target:String> [mode:String=debug] [tag:String]"
        );
        assert_eq!(format_arguments(&Command::default()), "");
    }
}
