// src/core/config_loader.rs

//! # Config Loader
//!
//! Finds and parses the configuration that applies to a project. The project
//! file `stoke/config.toml` wins over the user-wide
//! `~/.config/stoke/config.toml`; with neither present the defaults apply.
//! Missing keys fall back to their defaults and unknown keys are rejected.

use crate::{
    core::paths::{self, PathError},
    models::Config,
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Which file the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Project(PathBuf),
    Global(PathBuf),
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Project(path) | ConfigSource::Global(path) => {
                write!(f, "{}", path.display())
            }
            ConfigSource::Default => f.write_str("built-in defaults"),
        }
    }
}

/// Loads the configuration for `project_root`.
pub fn load(project_root: Option<&Path>) -> Result<(Config, ConfigSource), ConfigError> {
    if let Some(root) = project_root {
        let project_path = paths::project_config_path(root);
        if project_path.is_file() {
            log::debug!("Using project config '{}'", project_path.display());
            return Ok((read(&project_path)?, ConfigSource::Project(project_path)));
        }
    }

    match paths::get_global_config_path() {
        Ok(global_path) if global_path.is_file() => {
            log::debug!("Using global config '{}'", global_path.display());
            Ok((read(&global_path)?, ConfigSource::Global(global_path)))
        }
        Ok(_) => Ok((Config::default(), ConfigSource::Default)),
        Err(e) => {
            log::debug!("No global config directory: {}", e);
            Ok((Config::default(), ConfigSource::Default))
        }
    }
}

fn read(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse(path, &content)
}

pub fn parse(path: &Path, content: &str) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Renders `config` the way it would be written to `config.toml`.
pub fn to_toml(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Applies the process-wide parts of `config`.
pub fn apply(config: &Config) {
    if !config.colors {
        colored::control::set_override(false);
    }
}
