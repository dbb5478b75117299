// src/core/graph_display.rs

use crate::models::{Command, CommandRef};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

/// How a node hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Root,
    Chain,
    Dependency,
}

/// Renders the chain and dependency tree below `root`.
pub fn render_command_tree(root: &CommandRef) -> String {
    let mut out = String::new();
    write_label(&mut out, root, Edge::Root);
    write_children(&mut out, &root.command, "");
    out
}

/// Renders every command that no other command references, each with its
/// tree. Commands are expected sorted by name.
pub fn render_graph(commands: &[Arc<Command>]) -> String {
    if commands.is_empty() {
        return "No commands found.\n".to_string();
    }

    let referenced: HashSet<&str> = commands
        .iter()
        .flat_map(|c| c.chain.iter().chain(c.dependencies.iter()))
        .map(CommandRef::name)
        .collect();
    let mut roots: Vec<&Arc<Command>> = commands
        .iter()
        .filter(|c| !referenced.contains(c.name.as_str()))
        .collect();
    if roots.is_empty() {
        roots = commands.iter().collect();
    }

    roots
        .into_iter()
        .map(|command| render_command_tree(&CommandRef::plain(Arc::clone(command))))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_children(out: &mut String, command: &Command, prefix: &str) {
    let children: Vec<(&CommandRef, Edge)> = command
        .chain
        .iter()
        .map(|c| (c, Edge::Chain))
        .chain(command.dependencies.iter().map(|d| (d, Edge::Dependency)))
        .collect();

    for (i, (child, edge)) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        let connector = if is_last { "└─ " } else { "├─ " };
        out.push_str(prefix);
        out.push_str(connector);
        write_label(out, child, *edge);

        let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
        write_children(out, &child.command, &child_prefix);
    }
}

fn write_label(out: &mut String, node: &CommandRef, edge: Edge) {
    out.push_str(&node.to_string());
    match edge {
        Edge::Root => {}
        Edge::Chain => out.push_str(" (chain)"),
        Edge::Dependency => out.push_str(" (dep)"),
    }
    if !node.command.outputs.is_empty() {
        // Writing to a String cannot fail.
        let _ = write!(out, " -> [{}]", node.command.outputs.join(", "));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, chain: Vec<CommandRef>, deps: Vec<CommandRef>) -> Arc<Command> {
        Arc::new(Command {
            name: name.to_string(),
            chain,
            dependencies: deps,
            ..Default::default()
        })
    }

    #[test]
    fn test_render_tree() {
        let clean = command("clean", vec![], vec![]);
        let codegen = Arc::new(Command {
            name: "codegen".to_string(),
            outputs: vec!["gen.rs".to_string()],
            ..Default::default()
        });
        let configure = command("configure", vec![CommandRef::plain(clean.clone())], vec![]);
        let build = command(
            "build",
            vec![
                CommandRef::plain(clean),
                CommandRef::instantiate(configure, vec!["release".to_string()]),
            ],
            vec![CommandRef::plain(codegen)],
        );

        let tree = render_command_tree(&CommandRef::plain(build));
        assert_eq!(
            tree,
            "build\n\
             ├─ clean (chain)\n\
             ├─ configure release (chain)\n\
             │  └─ clean (chain)\n\
             └─ codegen (dep) -> [gen.rs]\n"
        );
    }

    #[test]
    fn test_render_graph_starts_at_roots() {
        let clean = command("clean", vec![], vec![]);
        let build = command("build", vec![CommandRef::plain(clean.clone())], vec![]);
        let graph = render_graph(&[build, clean]);
        assert_eq!(graph, "build\n└─ clean (chain)\n");
    }

    #[test]
    fn test_render_empty_graph() {
        assert_eq!(render_graph(&[]), "No commands found.\n");
    }
}
