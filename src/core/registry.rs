// src/core/registry.rs

//! The command graph: one shared, mutex-guarded table from command name to
//! its resolved [`Command`]. Entries are added at most once per name per
//! generation; [`CommandRegistry::flush`] starts a new generation.

use crate::models::Command;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Receives the names of newly resolved commands, e.g. to feed an
/// interactive shell's autocompletion.
pub trait Completer: Send + Sync + fmt::Debug {
    fn add_command(&self, name: &str);

    /// Called when the graph is flushed.
    fn clear(&self) {}
}

/// A completer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompleter;

impl Completer for NoCompleter {
    fn add_command(&self, _name: &str) {}
}

#[derive(Debug, Default)]
struct RegistryInner {
    commands: HashMap<String, Arc<Command>>,
    generation: u64,
}

#[derive(Debug)]
pub struct CommandRegistry {
    inner: Mutex<RegistryInner>,
    completer: Arc<dyn Completer>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::with_completer(Arc::new(NoCompleter))
    }

    pub fn with_completer(completer: Arc<dyn Completer>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            completer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.lock().commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().commands.contains_key(name)
    }

    /// Stores `command` unless an entry with the same name exists, and returns
    /// whichever instance is in the graph afterwards.
    pub fn insert(&self, command: Command) -> Arc<Command> {
        let name = command.name.clone();
        let (entry, inserted) = {
            let mut inner = self.lock();
            match inner.commands.get(&name) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let entry = Arc::new(command);
                    inner.commands.insert(name.clone(), Arc::clone(&entry));
                    (entry, true)
                }
            }
        };
        if inserted {
            log::debug!("Added '{}' to the command graph", name);
            self.completer.add_command(&name);
        } else {
            log::debug!("'{}' is already in the command graph, keeping the existing entry", name);
        }
        entry
    }

    pub fn len(&self) -> usize {
        self.lock().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().commands.is_empty()
    }

    /// All command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// All commands, sorted by name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = self.lock().commands.values().cloned().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Drops every entry and starts a new generation, which is returned.
    pub fn flush(&self) -> u64 {
        let generation = {
            let mut inner = self.lock();
            inner.commands.clear();
            inner.generation += 1;
            inner.generation
        };
        self.completer.clear();
        log::debug!("Flushed command graph, generation {}", generation);
        generation
    }
}
