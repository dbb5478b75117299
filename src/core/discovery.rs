// src/core/discovery.rs

//! Bulk resolution of every command a project defines: the scripts in
//! `stoke/` plus the manifest entries. The names are split into two halves
//! that are resolved side by side; overlapping chains meet in the job table.

use crate::{
    constants::{BUILTIN_COMMANDS, ERROR_DUMP_FILE_STEM, GLOBALS_FILE_STEM},
    core::{
        job_coordinator::{GraphError, JobCoordinator},
        language,
    },
};
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

/// Outcome of a discovery pass that did not hit a cycle.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub resolved: Vec<String>,
    pub failed: Vec<(String, GraphError)>,
    /// Names hidden behind a built-in CLI command.
    pub shadowed: Vec<String>,
}

/// Names of the command scripts directly inside `scripts_dir`, sorted.
pub fn script_names(scripts_dir: &Path) -> Vec<String> {
    let mut names = BTreeSet::new();
    for entry in WalkDir::new(scripts_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let (Some(stem), Some(extension)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };
        if stem == GLOBALS_FILE_STEM || stem == ERROR_DUMP_FILE_STEM || stem.starts_with('.') {
            continue;
        }
        if language::by_extension(extension).is_none() {
            log::trace!("Ignoring '{}'", path.display());
            continue;
        }
        if !names.insert(stem.to_string()) {
            log::warn!(
                "More than one script is named '{}'; only one of them is used.",
                stem
            );
        }
    }
    names.into_iter().collect()
}

/// Resolves every script and manifest command. A cycle anywhere aborts the
/// pass; other failures are collected in the report.
pub fn discover(coordinator: &JobCoordinator) -> Result<DiscoveryReport, GraphError> {
    let sources = coordinator.sources();
    let mut names: BTreeSet<String> = script_names(&sources.scripts_dir).into_iter().collect();
    if let Some(manifest) = &sources.manifest {
        for name in manifest.command_names() {
            if names.contains(name) {
                log::warn!(
                    "'{}' is defined in both the manifest and stoke/; the manifest entry is used.",
                    name
                );
            }
            names.insert(name.to_string());
        }
    }
    let names: Vec<String> = names.into_iter().collect();

    let shadowed: Vec<String> = names
        .iter()
        .filter(|n| BUILTIN_COMMANDS.contains(&n.as_str()))
        .cloned()
        .collect();
    for name in &shadowed {
        log::warn!(
            "Command '{}' has the name of a built-in command; use 'stoke run {}' to run it.",
            name,
            name
        );
    }

    log::debug!("Discovering {} command(s)", names.len());
    let (left, right) = names.split_at(names.len() / 2);
    let (mut results, right_results) = rayon::join(
        || resolve_all(coordinator, left),
        || resolve_all(coordinator, right),
    );
    results.extend(right_results);

    let mut report = DiscoveryReport {
        shadowed,
        ..Default::default()
    };
    for (name, result) in results {
        match result {
            Ok(()) => report.resolved.push(name),
            Err(e) if e.is_cycle() => return Err(e),
            Err(e) => report.failed.push((name, e)),
        }
    }
    Ok(report)
}

fn resolve_all(
    coordinator: &JobCoordinator,
    names: &[String],
) -> Vec<(String, Result<(), GraphError>)> {
    names
        .iter()
        .map(|name| (name.clone(), coordinator.resolve(name).map(|_| ())))
        .collect()
}
