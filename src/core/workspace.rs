// src/core/workspace.rs

//! # Workspace
//!
//! The explicit owner of everything one project needs at run time: its
//! configuration, manifest and globals, the command graph, the job table,
//! the process table, the job coordinator and the execution engine. Front
//! ends (the CLI, or a long-lived session fed by a file watcher) go through a
//! `Workspace` instead of reaching for process-wide state.

use crate::{
    CancellationToken,
    constants::GLOBALS_FILE_STEM,
    core::{
        config_loader::{self, ConfigError, ConfigSource},
        discovery::{self, DiscoveryReport},
        globals::{Globals, GlobalsError},
        job_coordinator::{CommandSources, GraphError, JobCoordinator},
        job_table::JobTable,
        language,
        manifest::{Manifest, ManifestError},
        paths::{self, PathError},
        registry::{CommandRegistry, Completer, NoCompleter},
        task_executor::{ExecutionEngine, RunError},
    },
    models::{Command, CommandRef, Config},
    system::{executor, processes::ProcessTable},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Globals(#[from] GlobalsError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("Hook '{hook}' failed: {source}")]
    Hook {
        hook: String,
        #[source]
        source: executor::ExecutionError,
    },
}

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Create,
    Write,
    Remove,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub op: FileOp,
}

/// How the workspace reacted to a [`FileEvent`].
#[derive(Debug)]
pub enum FileEventOutcome {
    Ignored,
    /// The graph was flushed; commands resolve lazily again.
    Flushed { generation: u64 },
    /// The graph was flushed and rebuilt.
    Rediscovered {
        generation: u64,
        report: DiscoveryReport,
    },
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
    config_source: ConfigSource,
    manifest: Option<Arc<Manifest>>,
    globals: Arc<Globals>,
    registry: Arc<CommandRegistry>,
    jobs: Arc<JobTable>,
    processes: Arc<ProcessTable>,
    token: CancellationToken,
    coordinator: JobCoordinator,
    engine: ExecutionEngine,
}

impl Workspace {
    /// Finds the project around `start` and loads it.
    pub fn open(
        start: &Path,
        processes: Arc<ProcessTable>,
        token: CancellationToken,
    ) -> Result<Self, WorkspaceError> {
        let root = paths::find_project_root(start)?;
        let (config, source) = config_loader::load(Some(root.as_path()))?;
        Self::load(root, config, source, processes, token, Arc::new(NoCompleter))
    }

    /// Loads the project at `root` with an already chosen configuration.
    pub fn load(
        root: PathBuf,
        config: Config,
        config_source: ConfigSource,
        processes: Arc<ProcessTable>,
        token: CancellationToken,
        completer: Arc<dyn Completer>,
    ) -> Result<Self, WorkspaceError> {
        let manifest = Manifest::load(&paths::manifest_path(&root))?.map(Arc::new);
        let globals = Arc::new(load_globals(&root, manifest.as_deref())?);
        let registry = Arc::new(CommandRegistry::with_completer(completer));
        let jobs = Arc::new(JobTable::new());

        let coordinator = JobCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&jobs),
            command_sources(&root, &config, manifest.clone(), &globals),
            config.recursion_depth,
        );
        let engine = ExecutionEngine::new(
            root.clone(),
            config.clone(),
            Arc::clone(&globals),
            Arc::clone(&processes),
            Arc::clone(&token),
        );

        log::debug!("Opened workspace '{}'", root.display());
        Ok(Self {
            root,
            config,
            config_source,
            manifest,
            globals,
            registry,
            jobs,
            processes,
            token,
            coordinator,
            engine,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_source(&self) -> &ConfigSource {
        &self.config_source
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_deref()
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn coordinator(&self) -> &JobCoordinator {
        &self.coordinator
    }

    /// Resolves every command of the project.
    pub fn discover(&self) -> Result<DiscoveryReport, GraphError> {
        discovery::discover(&self.coordinator)
    }

    /// Looks `name` up in the graph, resolving it on first use.
    pub fn resolve(&self, name: &str) -> Result<Arc<Command>, GraphError> {
        match self.registry.get(name) {
            Some(command) => Ok(command),
            None => self.coordinator.resolve_silent(name),
        }
    }

    /// Runs command `name` with `args`.
    pub fn run_command(&self, name: &str, args: &[String]) -> Result<(), WorkspaceError> {
        let command = self.resolve(name)?;
        self.engine.run(&CommandRef::plain(command), args)?;
        Ok(())
    }

    /// Runs a `->` chain string such as `clean -> build release`.
    pub fn run_chain_string(&self, chain: &str) -> Result<(), WorkspaceError> {
        let members = self.coordinator.resolve_chain_string(chain)?;
        self.engine.run_chain(&members)?;
        Ok(())
    }

    /// Joins background runs started by async commands.
    pub fn wait_detached(&self) -> Vec<(String, RunError)> {
        self.engine.wait_detached()
    }

    pub fn run_startup_hook(&self) -> Result<(), WorkspaceError> {
        self.run_hook(self.manifest().and_then(Manifest::startup_hook))
    }

    pub fn run_exit_hook(&self) -> Result<(), WorkspaceError> {
        self.run_hook(self.manifest().and_then(Manifest::exit_hook))
    }

    fn run_hook(&self, hook: Option<&str>) -> Result<(), WorkspaceError> {
        let Some(hook) = hook else {
            return Ok(());
        };
        log::debug!("Running hook '{}'", hook);
        executor::execute_command(hook, &self.root, &self.processes, &self.token).map_err(
            |source| WorkspaceError::Hook {
                hook: hook.to_string(),
                source,
            },
        )
    }

    /// Reacts to a change on disk. Manifest changes reload the manifest and
    /// flush the graph; script and globals changes flush it and run
    /// discovery again.
    pub fn handle_file_event(
        &mut self,
        event: &FileEvent,
    ) -> Result<FileEventOutcome, WorkspaceError> {
        let scripts_dir = paths::scripts_dir(&self.root);

        if event.path == paths::manifest_path(&self.root) {
            log::debug!("Manifest {:?}, reloading", event.op);
            self.manifest = Manifest::load(&event.path)?.map(Arc::new);
            self.reload_globals()?;
            let generation = self.registry.flush();
            return Ok(FileEventOutcome::Flushed { generation });
        }

        if event.path.parent() != Some(scripts_dir.as_path()) {
            return Ok(FileEventOutcome::Ignored);
        }
        let is_script = event
            .path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(language::by_extension)
            .is_some();
        if !is_script {
            return Ok(FileEventOutcome::Ignored);
        }

        let is_globals =
            event.path.file_stem().and_then(|s| s.to_str()) == Some(GLOBALS_FILE_STEM);
        if is_globals {
            log::debug!("Globals script {:?}, reloading", event.op);
            self.reload_globals()?;
        }

        let generation = self.registry.flush();
        let report = self.discover()?;
        Ok(FileEventOutcome::Rediscovered { generation, report })
    }

    fn reload_globals(&mut self) -> Result<(), WorkspaceError> {
        self.globals = Arc::new(load_globals(&self.root, self.manifest.as_deref())?);
        self.coordinator = JobCoordinator::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.jobs),
            command_sources(&self.root, &self.config, self.manifest.clone(), &self.globals),
            self.config.recursion_depth,
        );
        self.engine = self.engine.with_globals(Arc::clone(&self.globals));
        Ok(())
    }
}

fn load_globals(root: &Path, manifest: Option<&Manifest>) -> Result<Globals, GlobalsError> {
    let empty = BTreeMap::new();
    let vars = manifest.map_or(&empty, |m| &m.file().globals);
    Globals::load(&paths::scripts_dir(root), vars)
}

fn command_sources(
    root: &Path,
    config: &Config,
    manifest: Option<Arc<Manifest>>,
    globals: &Globals,
) -> CommandSources {
    CommandSources {
        project_root: root.to_path_buf(),
        scripts_dir: paths::scripts_dir(root),
        manifest,
        global_names: globals.names().clone(),
        fix_parse_errors: config.fix_parse_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use tempfile::{TempDir, tempdir};

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("stoke")).unwrap();
        for (path, content) in files {
            fs::write(dir.path().join(path), content).unwrap();
        }
        dir
    }

    fn open(dir: &TempDir) -> Workspace {
        let config = Config {
            quiet: true,
            ..Default::default()
        };
        Workspace::load(
            dir.path().to_path_buf(),
            config,
            ConfigSource::Default,
            Arc::new(ProcessTable::new()),
            Arc::new(AtomicBool::new(false)),
            Arc::new(NoCompleter),
        )
        .unwrap()
    }

    #[test]
    fn test_open_finds_root_and_config() {
        let dir = project(&[("stoke/config.toml", "recursion_depth = 2\n")]);
        let nested = dir.path().join("src");
        fs::create_dir(&nested).unwrap();

        let workspace = Workspace::open(
            &nested,
            Arc::new(ProcessTable::new()),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        assert_eq!(workspace.config().recursion_depth, 2);
        assert!(matches!(workspace.config_source(), ConfigSource::Project(_)));
    }

    #[test]
    fn test_globals_reserve_argument_names() {
        let dir = project(&[
            ("stoke/globals.sh", "#!/bin/bash\nTARGET=x86\n"),
            ("stoke/build.sh", "#!/bin/bash\n# @stoke-args: TARGET:String\necho\n"),
        ]);
        let err = open(&dir).resolve("build").unwrap_err();
        assert!(err.to_string().contains("TARGET"));
    }

    #[test]
    fn test_manifest_event_flushes_graph() {
        let dir = project(&[(
            "Stokefile.toml",
            "[commands.hello]\nexec = \"echo hi\"\nhelp = \"old\"\n",
        )]);
        let mut workspace = open(&dir);
        let before = workspace.resolve("hello").unwrap();
        assert_eq!(before.help, "old");

        fs::write(
            dir.path().join("Stokefile.toml"),
            "[commands.hello]\nexec = \"echo hi\"\nhelp = \"new\"\n",
        )
        .unwrap();
        let outcome = workspace
            .handle_file_event(&FileEvent {
                path: dir.path().join("Stokefile.toml"),
                op: FileOp::Write,
            })
            .unwrap();
        assert!(matches!(outcome, FileEventOutcome::Flushed { generation: 1 }));

        let after = workspace.resolve("hello").unwrap();
        assert_eq!(after.help, "new");
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_script_event_rediscovers() {
        let dir = project(&[("stoke/a.sh", "#!/bin/bash\necho a\n")]);
        let mut workspace = open(&dir);
        workspace.discover().unwrap();
        assert_eq!(workspace.registry().names(), vec!["a"]);

        fs::write(dir.path().join("stoke/b.sh"), "#!/bin/bash\necho b\n").unwrap();
        let outcome = workspace
            .handle_file_event(&FileEvent {
                path: dir.path().join("stoke/b.sh"),
                op: FileOp::Create,
            })
            .unwrap();
        let FileEventOutcome::Rediscovered { generation, report } = outcome else {
            unreachable!("script events rediscover");
        };
        assert_eq!(generation, 1);
        assert_eq!(report.resolved, vec!["a", "b"]);
    }

    #[test]
    fn test_unrelated_event_ignored() {
        let dir = project(&[]);
        let mut workspace = open(&dir);
        let outcome = workspace
            .handle_file_event(&FileEvent {
                path: dir.path().join("README.md"),
                op: FileOp::Write,
            })
            .unwrap();
        assert!(matches!(outcome, FileEventOutcome::Ignored));
        assert_eq!(workspace.registry().generation(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_and_chain_string() {
        let dir = project(&[
            ("stoke/a.sh", "#!/bin/bash\necho a >> log\n"),
            ("stoke/b.sh", "#!/bin/bash\n# @stoke-args: n:Int\necho b$n >> log\n"),
        ]);
        let workspace = open(&dir);

        workspace.run_command("b", &["n=1".to_string()]).unwrap();
        workspace.run_chain_string("a -> b 2").unwrap();
        let log = fs::read_to_string(dir.path().join("log")).unwrap();
        assert_eq!(log, "b1\na\nb2\n");
    }
}
