// src/system/signals.rs

//! OS signal handling. A dedicated thread drives a current-thread `tokio`
//! runtime that waits for interrupt, terminate, hangup or quit. Each signal
//! raises the cancellation token and kills every tracked child; with nothing
//! left to kill the process exits with the interrupted status.

use crate::{CancellationToken, constants::INTERRUPTED_EXIT_CODE, system::processes::ProcessTable};
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

/// Starts the listener thread.
pub fn install(
    processes: Arc<ProcessTable>,
    token: CancellationToken,
) -> io::Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("stoke-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    match wait_for_signal().await {
                        Ok(signal) => {
                            log::debug!("Received {}", signal);
                            if handle_signal(&processes, &token) == 0 {
                                std::process::exit(INTERRUPTED_EXIT_CODE);
                            }
                        }
                        Err(e) => {
                            log::warn!("Signal listener stopped: {}", e);
                            return;
                        }
                    }
                }
            });
        })
}

/// Raises `token` and kills the tracked processes. Returns how many there were.
pub fn handle_signal(processes: &ProcessTable, token: &CancellationToken) -> usize {
    token.store(true, Ordering::SeqCst);
    processes.clear()
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = hangup.recv() => Ok("SIGHUP"),
        _ = quit.recv() => Ok("SIGQUIT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_handle_signal_raises_token() {
        let processes = ProcessTable::new();
        let token = Arc::new(AtomicBool::new(false));
        assert_eq!(handle_signal(&processes, &token), 0);
        assert!(token.load(Ordering::SeqCst));
    }
}
