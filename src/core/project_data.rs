// src/core/project_data.rs

use crate::{core::paths, models::ProjectData};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectDataError {
    #[error("Could not read project data '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt project data '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not write project data '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not serialize project data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads `stoke/project.json`, or the defaults when it does not exist yet.
pub fn load(project_root: &Path) -> Result<ProjectData, ProjectDataError> {
    let path = paths::project_data_path(project_root);
    if !path.exists() {
        return Ok(ProjectData::default());
    }
    let content = fs::read_to_string(&path).map_err(|source| ProjectDataError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ProjectDataError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `data` through a temporary file so readers never see a partial file.
pub fn save(project_root: &Path, data: &ProjectData) -> Result<(), ProjectDataError> {
    let path = paths::project_data_path(project_root);
    let write_err = |source: std::io::Error| ProjectDataError::Write {
        path: path.display().to_string(),
        source,
    };

    let dir = path.parent().unwrap_or(project_root);
    fs::create_dir_all(dir).map_err(write_err)?;

    let json = serde_json::to_string_pretty(data)?;
    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(json.as_bytes()).map_err(write_err)?;
    temp.write_all(b"\n").map_err(write_err)?;
    temp.persist(&path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Increments and persists the build counter, returning the new value.
pub fn increment_build_number(project_root: &Path) -> Result<u64, ProjectDataError> {
    let mut data = load(project_root)?;
    data.build_number = data.build_number.saturating_add(1);
    save(project_root, &data)?;
    log::debug!("Build number is now {}", data.build_number);
    Ok(data.build_number)
}
