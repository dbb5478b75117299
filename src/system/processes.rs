// src/system/processes.rs

//! The table of running child processes. The execution engine registers each
//! interpreter it spawns; the signal listener kills whatever is still in the
//! table when the user interrupts the run.

use std::collections::HashMap;
use std::process::Child;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub type SharedChild = Arc<Mutex<Child>>;

#[derive(Debug)]
struct TrackedProcess {
    name: String,
    child: SharedChild,
}

#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: Mutex<HashMap<String, TrackedProcess>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedProcess>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks `child` and returns the random id to remove it with.
    pub fn add(&self, name: &str, child: SharedChild) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().insert(
            id.clone(),
            TrackedProcess {
                name: name.to_string(),
                child,
            },
        );
        log::trace!("Tracking process '{}' as {}", name, id);
        id
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Kills and forgets every tracked process. Returns how many were tracked.
    pub fn clear(&self) -> usize {
        let drained: Vec<TrackedProcess> = self.lock().drain().map(|(_, p)| p).collect();
        for process in &drained {
            let mut child = process.child.lock().unwrap_or_else(PoisonError::into_inner);
            match child.kill() {
                Ok(()) => log::debug!("Killed '{}' (PID {})", process.name, child.id()),
                // Already exited.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
                Err(e) => log::warn!("Failed to kill '{}' (PID {}): {}", process.name, child.id(), e),
            }
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names of the tracked processes, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().values().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }
}
