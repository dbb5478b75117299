// src/cli/dispatcher.rs

use anyhow::Result;

use crate::{
    cli::{AppContext, handlers},
    core::{task_executor::RunError, workspace::WorkspaceError},
    system::executor::ExecutionError,
};

// --- Command Definition and Registry ---

/// A built-in command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &AppContext) -> Result<()>,
}

/// Every built-in command. Any other first argument names a project command.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "config",
        aliases: &[],
        handler: handlers::config::handle,
    },
    CommandDefinition {
        name: "graph",
        aliases: &[],
        handler: handlers::graph::handle,
    },
    CommandDefinition {
        name: "info",
        aliases: &[],
        handler: handlers::info::handle,
    },
    CommandDefinition {
        name: "init",
        aliases: &[],
        handler: handlers::init::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run::handle,
    },
];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes the raw arguments to a handler.
///
/// - `stoke` lists the commands.
/// - `stoke <builtin> [args...]` calls the built-in.
/// - `stoke <command> [args...]` is a shortcut for `stoke run <command> [args...]`.
pub fn dispatch(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    log::debug!("Dispatching args: {:?}", args);

    let Some((first, rest)) = args.split_first() else {
        return handlers::list::handle(Vec::new(), ctx);
    };

    match find_command(first) {
        Some(command) => (command.handler)(rest.to_vec(), ctx),
        None => handlers::run::handle(args, ctx),
    }
}

/// True when `error` stems from the user interrupting a run.
pub fn is_interrupted(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<ExecutionError>() {
            return matches!(e, ExecutionError::Interrupted { .. });
        }
        if let Some(e) = cause.downcast_ref::<RunError>() {
            return e.is_interrupted();
        }
        if let Some(WorkspaceError::Run(e)) = cause.downcast_ref::<WorkspaceError>() {
            return e.is_interrupted();
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BUILTIN_COMMANDS;

    #[test]
    fn test_registry_matches_builtin_names() {
        for name in BUILTIN_COMMANDS {
            assert!(find_command(name).is_some(), "'{}' has no handler", name);
        }
        for command in COMMAND_REGISTRY {
            assert!(BUILTIN_COMMANDS.contains(&command.name));
            for alias in command.aliases {
                assert!(BUILTIN_COMMANDS.contains(alias));
            }
        }
    }

    #[test]
    fn test_find_command_by_alias() {
        assert_eq!(find_command("ls").map(|c| c.name), Some("list"));
        assert!(find_command("build").is_none());
    }

    #[test]
    fn test_is_interrupted() {
        let interrupted = anyhow::Error::new(RunError::Script {
            command: "build".to_string(),
            elapsed: "1s".to_string(),
            source: ExecutionError::Interrupted {
                command: "build".to_string(),
            },
        });
        assert!(is_interrupted(&interrupted));

        let wrapped = anyhow::Error::new(WorkspaceError::Run(RunError::MissingBody(
            "build".to_string(),
        )));
        assert!(!is_interrupted(&wrapped));
        assert!(!is_interrupted(&anyhow::anyhow!("plain failure")));
    }
}
