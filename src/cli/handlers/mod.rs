// src/cli/handlers/mod.rs

// One module per built-in command.

pub mod commons;
pub mod config;
pub mod graph;
pub mod info;
pub mod init;
pub mod list;
pub mod run;
