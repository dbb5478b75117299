// src/core/task_executor.rs

//! The execution engine.
//!
//! Running a [`CommandRef`] goes through these steps:
//!
//! 1. Skip the command when it declares outputs and all of them exist.
//! 2. Run each dependency that declares outputs and is missing at least one.
//! 3. Bind arguments. Parameters carried by the reference win over the
//!    arguments given by the caller.
//! 4. Run the command's chain in order, stopping at the first failure.
//! 5. Assemble globals, argument assignments and the script body.
//! 6. Hand the result to the interpreter and wait for it.
//! 7. On failure, dump and/or print the assembled script.
//! 8. On success, bump the build counter if the command asks for it.

use crate::{
    CancellationToken,
    core::{
        arg_binder::{self, BindingError, BoundArguments},
        globals::Globals,
        language::{self, Language},
        paths,
        progress::{self, Progress},
        project_data::{self, ProjectDataError},
        snippet,
    },
    models::{Command, CommandRef, Config},
    system::{
        executor::{self, ExecutionError},
        processes::ProcessTable,
    },
};
use colored::*;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("'{command}' failed after {elapsed}: {source}")]
    Script {
        command: String,
        elapsed: String,
        #[source]
        source: ExecutionError,
    },
    #[error("Chain member '{member}' of '{command}' failed: {source}")]
    ChainMember {
        command: String,
        member: String,
        #[source]
        source: Box<RunError>,
    },
    #[error("Dependency '{dependency}' of '{command}' failed: {source}")]
    Dependency {
        command: String,
        dependency: String,
        #[source]
        source: Box<RunError>,
    },
    #[error("Command '{command}' uses unknown language '{language}'")]
    UnknownLanguage { command: String, language: String },
    #[error("Command '{0}' has neither a script nor an exec body")]
    MissingBody(String),
    #[error("Could not read script '{path}': {source}")]
    ReadScript {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not prepare the script of '{command}': {source}")]
    Prepare {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not update the build number: {0}")]
    BuildNumber(#[from] ProjectDataError),
}

impl RunError {
    /// True when the run stopped because the user interrupted it.
    pub fn is_interrupted(&self) -> bool {
        match self {
            RunError::Script { source, .. } => {
                matches!(source, ExecutionError::Interrupted { .. })
            }
            RunError::ChainMember { source, .. } | RunError::Dependency { source, .. } => {
                source.is_interrupted()
            }
            _ => false,
        }
    }
}

type DetachedRun = (String, JoinHandle<Result<(), RunError>>);

/// Runs commands of one project. Cheap to clone; clones share the process
/// table and the list of detached runs.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    project_root: PathBuf,
    config: Config,
    globals: Arc<Globals>,
    processes: Arc<ProcessTable>,
    token: CancellationToken,
    progress: Arc<Progress>,
    detached: Arc<Mutex<Vec<DetachedRun>>>,
}

impl ExecutionEngine {
    pub fn new(
        project_root: PathBuf,
        config: Config,
        globals: Arc<Globals>,
        processes: Arc<ProcessTable>,
        token: CancellationToken,
    ) -> Self {
        let progress = Arc::new(Progress::new(config.quiet));
        Self {
            project_root,
            config,
            globals,
            processes,
            token,
            progress,
            detached: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A copy of this engine that renders `globals` instead. Detached runs
    /// stay shared.
    pub fn with_globals(&self, globals: Arc<Globals>) -> Self {
        Self {
            globals,
            ..self.clone()
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Runs `target` with the caller's `args`. Async commands are started on
    /// a worker thread and this returns right away; see
    /// [`wait_detached`](Self::wait_detached).
    pub fn run(&self, target: &CommandRef, args: &[String]) -> Result<(), RunError> {
        if target.command.is_async {
            return self.spawn_detached(target.clone(), args.to_vec());
        }
        self.run_top_level(target, args)
    }

    /// Runs the members of an ad hoc chain one after another, each with its
    /// own parameters only.
    pub fn run_chain(&self, members: &[CommandRef]) -> Result<(), RunError> {
        self.progress.begin(members.iter().map(chain_size).sum());
        scopeguard::defer! {
            self.progress.reset();
        }
        for member in members {
            self.execute(member, &[])?;
        }
        Ok(())
    }

    fn run_top_level(&self, target: &CommandRef, args: &[String]) -> Result<(), RunError> {
        self.progress.begin(chain_size(target));
        scopeguard::defer! {
            self.progress.reset();
        }
        self.execute(target, args)
    }

    fn spawn_detached(&self, target: CommandRef, args: Vec<String>) -> Result<(), RunError> {
        let name = target.name().to_string();
        let mut engine = self.clone();
        engine.progress = Arc::new(Progress::new(self.config.quiet));

        let handle = thread::Builder::new()
            .name(format!("stoke-{}", name))
            .spawn(move || engine.run_top_level(&target, &args))
            .map_err(|source| RunError::Prepare {
                command: name.clone(),
                source,
            })?;
        log::debug!("Started '{}' in the background", name);
        self.detached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, handle));
        Ok(())
    }

    /// Joins every background run and returns the failures.
    pub fn wait_detached(&self) -> Vec<(String, RunError)> {
        let runs: Vec<DetachedRun> = self
            .detached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let mut failures = Vec::new();
        for (name, handle) in runs {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push((name, e)),
                Err(_) => log::error!("Background run of '{}' panicked", name),
            }
        }
        failures
    }

    fn execute(&self, target: &CommandRef, args: &[String]) -> Result<(), RunError> {
        let command = &target.command;

        if self.outputs_exist(command) {
            if !self.config.quiet {
                println!("{} {} is up to date", "→".blue(), command.name.cyan());
            }
            log::debug!("Skipping '{}': all outputs exist", command.name);
            return Ok(());
        }

        for dependency in &command.dependencies {
            let dep = &dependency.command;
            if dep.outputs.is_empty() || self.outputs_exist(dep) {
                continue;
            }
            log::debug!("Dependency '{}' of '{}' is stale", dep.name, command.name);
            self.progress.add(chain_size(dependency));
            self.execute(dependency, &[])
                .map_err(|e| RunError::Dependency {
                    command: command.name.clone(),
                    dependency: dependency.to_string(),
                    source: Box::new(e),
                })?;
        }

        let bound = if target.has_params() {
            arg_binder::bind(command, &target.params)?
        } else {
            arg_binder::bind(command, args)?
        };

        for member in &command.chain {
            self.execute(member, &[])
                .map_err(|e| RunError::ChainMember {
                    command: command.name.clone(),
                    member: member.to_string(),
                    source: Box::new(e),
                })?;
        }

        self.run_script(command, &bound)
    }

    /// True when `command` declares outputs and every one of them exists.
    pub fn outputs_exist(&self, command: &Command) -> bool {
        !command.outputs.is_empty()
            && command.outputs.iter().all(|output| {
                paths::resolve_project_path(&self.project_root, output)
                    .map(|path| path.exists())
                    .unwrap_or(false)
            })
    }

    fn run_script(&self, command: &Command, bound: &BoundArguments) -> Result<(), RunError> {
        let language =
            language::by_name(&command.language).ok_or_else(|| RunError::UnknownLanguage {
                command: command.name.clone(),
                language: command.language.clone(),
            })?;
        let body = self.script_body(command)?;
        let script = assemble_script(language, &self.globals, bound, &body);

        let started = self.progress.start(&command.name);
        match self.spawn(command, language, &script) {
            Ok(()) => {
                self.progress.finish(&command.name, started);
                if command.build_number {
                    let number = project_data::increment_build_number(&self.project_root)?;
                    if !self.config.quiet {
                        println!("{} build #{}", "→".blue(), number.to_string().green());
                    }
                }
                Ok(())
            }
            Err(source) => {
                if !matches!(source, ExecutionError::Interrupted { .. }) {
                    self.report_failure(&mut std::io::stderr(), language, &script, &source);
                }
                Err(RunError::Script {
                    command: command.name.clone(),
                    elapsed: progress::format_duration(started.elapsed()),
                    source,
                })
            }
        }
    }

    fn script_body(&self, command: &Command) -> Result<String, RunError> {
        if let Some(exec) = &command.exec {
            return Ok(format!("{}\n", exec.trim_end()));
        }
        let path = command
            .path
            .as_deref()
            .ok_or_else(|| RunError::MissingBody(command.name.clone()))?;
        let content = fs::read_to_string(path).map_err(|source| RunError::ReadScript {
            path: path.display().to_string(),
            source,
        })?;
        Ok(strip_shebang(&content).to_string())
    }

    fn spawn(
        &self,
        command: &Command,
        language: &Language,
        script: &str,
    ) -> Result<(), ExecutionError> {
        let mut args = interpreter_args(language, self.config.stop_on_error);

        // Held until the interpreter exits.
        let _script_file = match language.evaluate_flag {
            Some(flag) if !language.use_temp_file => {
                args.push(flag.to_string());
                args.push(script.to_string());
                None
            }
            _ => {
                let file = write_temp_script(language, script).map_err(|source| {
                    ExecutionError::Spawn {
                        program: language.interpreter.to_string(),
                        source,
                    }
                })?;
                args.push(file.path().display().to_string());
                Some(file)
            }
        };

        executor::run_interpreter(
            &command.name,
            language.interpreter,
            &args,
            &self.project_root,
            &self.processes,
            &self.token,
        )
    }

    fn report_failure(
        &self,
        out: &mut dyn Write,
        language: &Language,
        script: &str,
        error: &ExecutionError,
    ) {
        if self.config.dump_script_on_error {
            let path = paths::error_dump_path(&self.project_root, language.file_extension);
            match fs::write(&path, error_dump(language, script, error)) {
                Ok(()) => {
                    let _ = writeln!(
                        out,
                        "{} failing script written to {}",
                        "→".yellow(),
                        path.display().to_string().dimmed()
                    );
                }
                Err(e) => log::warn!("Could not write '{}': {}", path.display(), e),
            }
        }
        if self.config.print_script_on_error {
            let _ = writeln!(out, "{}", snippet::numbered(script));
        }
    }
}

/// Number of commands a run of `target` executes through chains.
pub fn chain_size(target: &CommandRef) -> usize {
    1 + target.command.chain.iter().map(chain_size).sum::<usize>()
}

/// Globals first, then the argument assignments, then the body.
pub fn assemble_script(
    language: &Language,
    globals: &Globals,
    bound: &BoundArguments,
    body: &str,
) -> String {
    let mut script = globals.prelude(language);
    script.push_str(&bound.render(language));
    script.push_str(body);
    script
}

/// The interpreter's fixed arguments plus its stop-on-error flag when enabled.
fn interpreter_args(language: &Language, stop_on_error: bool) -> Vec<String> {
    let mut args: Vec<String> = language
        .interpreter_args
        .iter()
        .map(ToString::to_string)
        .collect();
    if stop_on_error && let Some(flag) = language.stop_on_error_flag {
        args.push(flag.to_string());
    }
    args
}

fn strip_shebang(content: &str) -> &str {
    if content.starts_with("#!") {
        content.split_once('\n').map_or("", |(_, rest)| rest)
    } else {
        content
    }
}

fn write_temp_script(language: &Language, script: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("stoke-")
        .suffix(&format!(".{}", language.file_extension))
        .tempfile()?;
    file.write_all(script.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn error_dump(language: &Language, script: &str, error: &ExecutionError) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!(
        "{}\n{}\n{}\n{}\n\n{}",
        language.shebang,
        language.comment_line("Error Dump"),
        language.comment_line(&format!("Timestamp: {}", timestamp)),
        language.comment_line(&format!("Error: {}", error)),
        script
    )
}
