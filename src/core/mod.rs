// src/core/mod.rs

pub mod arg_binder;
pub mod arg_decl;
pub mod config_loader;
pub mod discovery;
pub mod globals;
pub mod graph_display;
pub mod header_parser;
pub mod job_coordinator;
pub mod job_table;
pub mod language;
pub mod manifest;
pub mod paths;
pub mod progress;
pub mod project_data;
pub mod registry;
pub mod sanitize;
pub mod snippet;
pub mod task_executor;
pub mod workspace;
