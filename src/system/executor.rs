// src/system/executor.rs

use crate::{
    CancellationToken,
    system::processes::{ProcessTable, SharedChild},
};
use colored::*;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' {}", describe_exit(.code))]
    NonZeroExitStatus { command: String, code: Option<i32> },
    #[error("'{command}' was interrupted")]
    Interrupted { command: String },
    #[error("Lost track of '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// Runs `program args...` in `cwd` until it exits.
///
/// stdin and stdout are inherited; stderr is re-printed in red. The child is
/// tracked in `processes` under `name` while it runs, and killed when
/// `token` is raised.
pub fn run_interpreter(
    name: &str,
    program: &str,
    args: &[String],
    cwd: &Path,
    processes: &ProcessTable,
    token: &CancellationToken,
) -> Result<(), ExecutionError> {
    if token.load(Ordering::SeqCst) {
        return Err(ExecutionError::Interrupted {
            command: name.to_string(),
        });
    }

    log::debug!("Spawning {} {:?} in '{}'", program, args, cwd.display());
    let mut child = StdCommand::new(program)
        .args(args)
        .current_dir(dunce::simplified(cwd))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stderr_pump = child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                eprintln!("{}", line.red());
            }
        })
    });

    let child: SharedChild = Arc::new(Mutex::new(child));
    let id = processes.add(name, Arc::clone(&child));
    let status = {
        scopeguard::defer! {
            processes.remove(&id);
        }
        wait_for_exit(name, &child, token)
    };

    if let Some(pump) = stderr_pump {
        pump.join().ok();
    }

    let status = status?;
    if status.success() {
        Ok(())
    } else if token.load(Ordering::SeqCst) {
        Err(ExecutionError::Interrupted {
            command: name.to_string(),
        })
    } else {
        Err(ExecutionError::NonZeroExitStatus {
            command: name.to_string(),
            code: status.code(),
        })
    }
}

/// Polls `child` until it exits, killing it once `token` is raised.
fn wait_for_exit(
    name: &str,
    child: &Mutex<Child>,
    token: &CancellationToken,
) -> Result<ExitStatus, ExecutionError> {
    loop {
        let mut guard = child.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if token.load(Ordering::SeqCst) {
                    log::debug!(
                        "Cancellation requested, killing '{}' (PID {})",
                        name,
                        guard.id()
                    );
                    if let Err(e) = guard.kill() {
                        log::warn!("Failed to kill '{}' (PID {}): {}", name, guard.id(), e);
                    }
                    guard.wait().ok();
                    return Err(ExecutionError::Interrupted {
                        command: name.to_string(),
                    });
                }
            }
            Err(source) => {
                return Err(ExecutionError::Wait {
                    command: name.to_string(),
                    source,
                });
            }
        }
        drop(guard);
        thread::sleep(POLL_INTERVAL);
    }
}

/// Runs a single hook command line such as `docker compose up -d`. The line
/// is split with shell quoting rules and run without a shell.
pub fn execute_command(
    command_line: &str,
    cwd: &Path,
    processes: &ProcessTable,
    token: &CancellationToken,
) -> Result<(), ExecutionError> {
    let trimmed = command_line.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let parts = shlex::split(trimmed).ok_or_else(|| ExecutionError::CommandParse(trimmed.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Ok(());
    };
    run_interpreter(trimmed, program, args, cwd, processes, token)
}
