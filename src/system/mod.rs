//! # System Interaction Layer
//!
//! The boundary between the orchestration logic and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns interpreters and hook commands, waits for them
//!   while honouring the cancellation token, and re-prints their stderr.
//! - **`processes`**: the table of running children, so they can be killed
//!   from the signal listener.
//! - **`signals`**: turns interrupt, terminate, hangup and quit into
//!   cancellation plus forced cleanup of the process table.

pub mod executor;
pub mod processes;
pub mod signals;
