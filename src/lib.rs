//! # stoke
//!
//! A script-driven build orchestrator. Scripts in the project's `stoke/`
//! directory (or entries of a `Stokefile.toml` manifest) declare typed
//! arguments, dependency chains and output artifacts in their header
//! comments. `stoke` resolves them into a shared command graph and runs the
//! requested command with skip-if-output-exists semantics.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Flag raised by the signal listener when the user interrupts a run.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
