// src/core/job_coordinator.rs

//! Resolves command names into the shared command graph.
//!
//! Each top-level request runs as a [`ParseJob`]. A job walks the chain and
//! dependency references of the command it resolves, depth first, and keeps
//! the names on its current path so repeated occurrences can be counted
//! against the configured recursion depth. Names are resolved once per graph
//! generation: concurrent jobs that need the same name wait for the job that
//! got there first (see [`JobTable`]).

use crate::{
    core::{
        header_parser::{self, HeaderError},
        job_table::{Claim, JobId, JobTable},
        language::{self, Language},
        manifest::{Manifest, ManifestError},
        registry::CommandRegistry,
    },
    models::{Command, CommandRef, DependencySpec, HeaderData},
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(
        "Cycle detected: '{name}' occurs {occurrences} times in one chain (recursion depth is {depth})"
    )]
    CycleDetected {
        name: String,
        occurrences: usize,
        depth: usize,
    },
    #[error("Command '{0}' not found")]
    CommandNotFound(String),
    #[error("Invalid chain '{chain}': empty command at position {index}")]
    InvalidChain { chain: String, index: usize },
    #[error("{command} -> {source}")]
    Dependency {
        command: String,
        #[source]
        source: Box<GraphError>,
    },
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl GraphError {
    /// Cycles abort discovery; every other error only drops one command.
    pub fn is_cycle(&self) -> bool {
        match self {
            GraphError::CycleDetected { .. } => true,
            GraphError::Dependency { source, .. } => source.is_cycle(),
            _ => false,
        }
    }

    /// The innermost error, skipping dependency wrappers.
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Where command definitions come from.
#[derive(Debug, Clone)]
pub struct CommandSources {
    pub project_root: PathBuf,
    pub scripts_dir: PathBuf,
    pub manifest: Option<Arc<Manifest>>,
    pub global_names: HashSet<String>,
    pub fix_parse_errors: bool,
}

enum Source<'a> {
    Script(PathBuf, &'static Language),
    Manifest(&'a Manifest),
}

impl CommandSources {
    /// Manifest entries take precedence over scripts of the same name.
    fn locate(&self, name: &str) -> Option<Source<'_>> {
        if let Some(manifest) = self.manifest.as_deref()
            && manifest.contains(name)
        {
            return Some(Source::Manifest(manifest));
        }
        language::all().iter().find_map(|language| {
            let path = self
                .scripts_dir
                .join(format!("{}.{}", name, language.file_extension));
            path.is_file().then(|| Source::Script(path, language))
        })
    }
}

/// One resolution request and the names on its current path.
#[derive(Debug)]
pub struct ParseJob {
    id: JobId,
    root: String,
    visited: Vec<String>,
    silent: bool,
}

#[derive(Debug)]
pub struct JobCoordinator {
    registry: Arc<CommandRegistry>,
    jobs: Arc<JobTable>,
    sources: CommandSources,
    recursion_depth: usize,
}

impl JobCoordinator {
    pub fn new(
        registry: Arc<CommandRegistry>,
        jobs: Arc<JobTable>,
        sources: CommandSources,
        recursion_depth: usize,
    ) -> Self {
        Self {
            registry,
            jobs,
            sources,
            recursion_depth: recursion_depth.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn sources(&self) -> &CommandSources {
        &self.sources
    }

    /// Resolves `name` and everything it references, logging failures.
    pub fn resolve(&self, name: &str) -> Result<Arc<Command>, GraphError> {
        self.resolve_root(name, false)
    }

    /// Like [`resolve`](Self::resolve), but the caller reports errors itself.
    pub fn resolve_silent(&self, name: &str) -> Result<Arc<Command>, GraphError> {
        self.resolve_root(name, true)
    }

    fn resolve_root(&self, name: &str, silent: bool) -> Result<Arc<Command>, GraphError> {
        let mut job = self.start_job(name, silent);
        let result = self.resolve_name(&mut job, name);
        self.finish_job(&job, result.as_ref().err());
        result
    }

    /// Resolves an ad hoc chain such as `clean -> build release` into the
    /// ordered references it names.
    pub fn resolve_chain_string(&self, chain: &str) -> Result<Vec<CommandRef>, GraphError> {
        let specs =
            DependencySpec::parse_chain(chain).map_err(|index| GraphError::InvalidChain {
                chain: chain.to_string(),
                index,
            })?;
        let mut job = self.start_job(chain, true);
        let result = self.resolve_specs(&mut job, &specs);
        self.finish_job(&job, result.as_ref().err());
        result
    }

    fn start_job(&self, root: &str, silent: bool) -> ParseJob {
        let id = self.jobs.register_job(root, silent);
        log::trace!("Started parse job {} for '{}'", id, root);
        ParseJob {
            id,
            root: root.to_string(),
            visited: Vec::new(),
            silent,
        }
    }

    fn finish_job(&self, job: &ParseJob, error: Option<&GraphError>) {
        self.jobs.remove_job(job.id);
        if let Some(e) = error
            && !job.silent
        {
            log::warn!("Could not resolve '{}': {}", job.root, e);
        }
        log::trace!("Finished parse job {}", job.id);
    }

    /// Resolves a list of references as siblings of the job's current path.
    fn resolve_specs(
        &self,
        job: &mut ParseJob,
        specs: &[DependencySpec],
    ) -> Result<Vec<CommandRef>, GraphError> {
        let mut siblings: Vec<&str> = Vec::with_capacity(specs.len());
        let mut refs = Vec::with_capacity(specs.len());

        for spec in specs {
            let occurrences = 1
                + job.visited.iter().filter(|v| **v == spec.name).count()
                + siblings.iter().filter(|s| **s == spec.name).count();
            if occurrences > self.recursion_depth {
                return Err(GraphError::CycleDetected {
                    name: spec.name.clone(),
                    occurrences,
                    depth: self.recursion_depth,
                });
            }
            siblings.push(&spec.name);

            let command = self.resolve_name(job, &spec.name).map_err(|e| {
                match job.visited.last() {
                    Some(parent) => GraphError::Dependency {
                        command: parent.clone(),
                        source: Box::new(e),
                    },
                    None => e,
                }
            })?;

            refs.push(if spec.params.is_empty() {
                CommandRef::plain(command)
            } else {
                CommandRef::instantiate(command, spec.params.clone())
            });
        }
        Ok(refs)
    }

    fn resolve_name(&self, job: &mut ParseJob, name: &str) -> Result<Arc<Command>, GraphError> {
        loop {
            if let Some(command) = self.registry.get(name) {
                return Ok(command);
            }

            let claim = self
                .jobs
                .claim(name, job.id)
                .map_err(|_| GraphError::CycleDetected {
                    name: name.to_string(),
                    occurrences: 2,
                    depth: self.recursion_depth,
                })?;

            match claim {
                Claim::Acquired(guard) => {
                    let result = self.build_claimed(job, name);
                    // Waiters are woken whether or not the build succeeded.
                    drop(guard);
                    return result;
                }
                Claim::Reentrant => return self.build_claimed(job, name),
                Claim::Wait(done) => {
                    log::debug!("Job {} waiting for '{}'", job.id, name);
                    done.recv().ok();
                    self.jobs.finish_waiting(job.id);
                }
            }
        }
    }

    /// Builds `name` under a claim, unless another job registered it between
    /// the registry lookup and the claim.
    fn build_claimed(&self, job: &mut ParseJob, name: &str) -> Result<Arc<Command>, GraphError> {
        if let Some(command) = self.registry.get(name) {
            return Ok(command);
        }
        self.build(job, name).map(|c| self.registry.insert(c))
    }

    fn build(&self, job: &mut ParseJob, name: &str) -> Result<Command, GraphError> {
        let mut command = self.create(name)?;

        job.visited.push(name.to_string());
        let depth = job.visited.len();
        let resolved = self
            .resolve_specs(job, &command.chain_specs)
            .and_then(|chain| Ok((chain, self.resolve_specs(job, &command.dependency_specs)?)));
        job.visited.truncate(depth - 1);

        let (chain, dependencies) = resolved?;
        command.chain = chain;
        command.dependencies = dependencies;
        Ok(command)
    }

    fn create(&self, name: &str) -> Result<Command, GraphError> {
        match self.sources.locate(name) {
            Some(Source::Manifest(manifest)) => Ok(manifest.build_command(
                name,
                &self.sources.global_names,
                &self.sources.project_root,
            )?),
            Some(Source::Script(path, language)) => {
                log::debug!("Parsing '{}'", path.display());
                let header = header_parser::parse_script(
                    &path,
                    language,
                    &self.sources.global_names,
                    self.sources.fix_parse_errors,
                )?;
                Ok(command_from_header(name, &path, language, header))
            }
            None => Err(GraphError::CommandNotFound(name.to_string())),
        }
    }
}

fn command_from_header(
    name: &str,
    path: &Path,
    language: &Language,
    header: HeaderData,
) -> Command {
    Command {
        name: name.to_string(),
        path: Some(path.to_path_buf()),
        language: language.name.to_string(),
        arguments: header.arguments,
        description: header.description,
        help: header.help,
        manual: header.manual,
        dependency_specs: header.dependencies,
        chain_specs: header.chain,
        outputs: header.outputs,
        build_number: header.build_number,
        is_async: header.is_async,
        exec: None,
        chain: Vec::new(),
        dependencies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::tests::RecordingCompleter;
    use std::fs;
    use std::thread;
    use tempfile::{TempDir, tempdir};

    fn project(scripts: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        let stoke = dir.path().join("stoke");
        fs::create_dir(&stoke).unwrap();
        for (name, header) in scripts {
            fs::write(
                stoke.join(format!("{}.sh", name)),
                format!("#!/bin/bash\n{}\necho {}\n", header, name),
            )
            .unwrap();
        }
        dir
    }

    fn coordinator(dir: &TempDir, depth: usize) -> JobCoordinator {
        coordinator_with(dir, depth, Arc::new(CommandRegistry::new()))
    }

    fn coordinator_with(
        dir: &TempDir,
        depth: usize,
        registry: Arc<CommandRegistry>,
    ) -> JobCoordinator {
        let sources = CommandSources {
            project_root: dir.path().to_path_buf(),
            scripts_dir: dir.path().join("stoke"),
            manifest: None,
            global_names: HashSet::new(),
            fix_parse_errors: false,
        };
        JobCoordinator::new(registry, Arc::new(JobTable::new()), sources, depth)
    }

    // --- Resolution Tests ---

    #[test]
    fn test_resolution_is_memoized() {
        let dir = project(&[("build", "# @stoke-help: builds")]);
        let coordinator = coordinator(&dir, 1);

        let first = coordinator.resolve("build").unwrap();
        let second = coordinator.resolve("build").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.help, "builds");
        assert_eq!(coordinator.registry().len(), 1);
    }

    #[test]
    fn test_chain_members_share_graph_entries() {
        let dir = project(&[
            ("clean", ""),
            ("build", "# @stoke-chain: clean"),
            ("release", "# @stoke-chain: clean -> build"),
        ]);
        let coordinator = coordinator(&dir, 1);

        let release = coordinator.resolve("release").unwrap();
        let clean = coordinator.registry().get("clean").unwrap();
        assert_eq!(release.chain.len(), 2);
        assert!(Arc::ptr_eq(&release.chain[0].command, &clean));
        assert!(Arc::ptr_eq(&release.chain[1].command.chain[0].command, &clean));
    }

    #[test]
    fn test_params_instantiate_without_mutating_entry() {
        let dir = project(&[
            ("configure", "# @stoke-args: mode:String"),
            ("build", "# @stoke-chain: configure release"),
        ]);
        let coordinator = coordinator(&dir, 1);

        let build = coordinator.resolve("build").unwrap();
        let configure_ref = &build.chain[0];
        assert_eq!(configure_ref.params, vec!["release".to_string()]);
        assert!(configure_ref.has_params());

        let shared = coordinator.registry().get("configure").unwrap();
        assert!(Arc::ptr_eq(&configure_ref.command, &shared));
        assert!(shared.chain.is_empty());
    }

    #[test]
    fn test_dependencies_resolved() {
        let dir = project(&[
            ("compile", "# @stoke-outputs: bin/app"),
            ("package", "# @stoke-deps: compile"),
        ]);
        let coordinator = coordinator(&dir, 1);
        let package = coordinator.resolve("package").unwrap();
        assert_eq!(package.dependencies.len(), 1);
        assert_eq!(package.dependencies[0].name(), "compile");
    }

    #[test]
    fn test_missing_command() {
        let dir = project(&[("build", "# @stoke-chain: nope")]);
        let coordinator = coordinator(&dir, 1);

        let err = coordinator.resolve_silent("build").unwrap_err();
        assert!(matches!(err.root_cause(), GraphError::CommandNotFound(n) if n == "nope"));
        assert!(!err.is_cycle());
        assert!(coordinator.registry().get("build").is_none());

        let err = coordinator.resolve_silent("ghost").unwrap_err();
        assert!(matches!(err, GraphError::CommandNotFound(_)));
    }

    #[test]
    fn test_claimed_name_registered_meanwhile_is_not_rebuilt() {
        let dir = project(&[]);
        let completer = Arc::new(RecordingCompleter::default());
        let registry = Arc::new(CommandRegistry::with_completer(completer.clone()));
        let coordinator = coordinator_with(&dir, 1, registry);
        let existing = coordinator.registry().insert(Command {
            name: "build".to_string(),
            ..Default::default()
        });

        // No script named build exists, so a rebuild would fail.
        let mut job = coordinator.start_job("build", true);
        let Ok(Claim::Acquired(guard)) = coordinator.jobs.claim("build", job.id) else {
            panic!("expected to acquire 'build'");
        };
        let resolved = coordinator.build_claimed(&mut job, "build").unwrap();
        drop(guard);
        coordinator.finish_job(&job, None);

        assert!(Arc::ptr_eq(&resolved, &existing));
        assert_eq!(*completer.names.lock().unwrap(), vec!["build".to_string()]);
    }

    // --- Cycle Tests ---

    #[test]
    fn test_chain_string_cycle_depends_on_recursion_depth() {
        let dir = project(&[("a", ""), ("b", "")]);

        let err = coordinator(&dir, 1)
            .resolve_chain_string("a -> b -> a")
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::CycleDetected { ref name, occurrences: 2, depth: 1 } if name == "a"
        ));

        let refs = coordinator(&dir, 2)
            .resolve_chain_string("a -> b -> a")
            .unwrap();
        let names: Vec<&str> = refs.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert!(Arc::ptr_eq(&refs[0].command, &refs[2].command));
    }

    #[test]
    fn test_header_cycle_detected() {
        let dir = project(&[("a", "# @stoke-chain: b"), ("b", "# @stoke-chain: a")]);
        for depth in [1, 3] {
            let err = coordinator(&dir, depth).resolve_silent("a").unwrap_err();
            assert!(err.is_cycle(), "depth {} gave {}", depth, err);
        }
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let dir = project(&[
            ("clean", ""),
            ("compile", "# @stoke-chain: clean"),
            ("build", "# @stoke-chain: clean -> compile"),
        ]);
        assert!(coordinator(&dir, 1).resolve("build").is_ok());
    }

    #[test]
    fn test_invalid_chain_string() {
        let dir = project(&[("a", "")]);
        let err = coordinator(&dir, 1)
            .resolve_chain_string("a -> -> a")
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidChain { index: 1, .. }));
    }

    // --- Concurrency Tests ---

    #[test]
    fn test_concurrent_jobs_resolve_once() {
        let dir = project(&[
            ("clean", ""),
            ("build", "# @stoke-chain: clean"),
            ("test", "# @stoke-chain: build"),
        ]);
        let completer = Arc::new(RecordingCompleter::default());
        let registry = Arc::new(CommandRegistry::with_completer(completer.clone()));
        let coordinator = Arc::new(coordinator_with(&dir, 1, registry));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || {
                    let root = if i % 2 == 0 { "test" } else { "build" };
                    coordinator.resolve(root).unwrap();
                    coordinator.registry().get("clean").unwrap()
                })
            })
            .collect();
        let cleans: Vec<Arc<Command>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(cleans.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        let mut names = completer.names.lock().unwrap().clone();
        names.sort();
        assert_eq!(names, vec!["build", "clean", "test"]);
    }

    #[test]
    fn test_failed_resolution_releases_waiters() {
        let dir = project(&[("broken", "# @stoke-args: x:Nope")]);
        let coordinator = Arc::new(coordinator(&dir, 1));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.resolve_silent("broken").is_err())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert!(coordinator.registry().is_empty());
    }
}
