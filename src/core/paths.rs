// src/core/paths.rs

use crate::constants::{
    CONFIG_FILENAME, ERROR_DUMP_FILE_STEM, MANIFEST_FILENAME, PROJECT_DATA_FILENAME, STOKE_DIR,
};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref STOKE_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error(
        "No stoke project found in '{start}' or any parent directory (expected a '{}' directory or a '{}' file).",
        STOKE_DIR,
        MANIFEST_FILENAME
    )]
    ProjectRootNotFound { start: String },
    #[error("Could not expand path '{path}': {reason}")]
    Expansion { path: String, reason: String },
}

/// Returns the user-wide configuration directory (`~/.config/stoke`).
///
/// Memoized: the first call computes the path, later calls clone it.
pub fn get_stoke_config_dir() -> Result<PathBuf, PathError> {
    let mut cached = STOKE_CONFIG_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(STOKE_DIR);

    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// `~/.config/stoke/config.toml`.
pub fn get_global_config_path() -> Result<PathBuf, PathError> {
    get_stoke_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Walks up from `start` to the first directory holding a `stoke/`
/// directory or a manifest.
pub fn find_project_root(start: &Path) -> Result<PathBuf, PathError> {
    let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|dir| dir.join(STOKE_DIR).is_dir() || dir.join(MANIFEST_FILENAME).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| PathError::ProjectRootNotFound {
            start: start.display().to_string(),
        })
}

pub fn scripts_dir(project_root: &Path) -> PathBuf {
    project_root.join(STOKE_DIR)
}

pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST_FILENAME)
}

pub fn project_config_path(project_root: &Path) -> PathBuf {
    scripts_dir(project_root).join(CONFIG_FILENAME)
}

pub fn project_data_path(project_root: &Path) -> PathBuf {
    scripts_dir(project_root).join(PROJECT_DATA_FILENAME)
}

pub fn error_dump_path(project_root: &Path, extension: &str) -> PathBuf {
    project_root.join(format!("{}.{}", ERROR_DUMP_FILE_STEM, extension))
}

/// Expands `~` and environment variables in `raw` and anchors relative
/// results at `project_root`.
pub fn resolve_project_path(project_root: &Path, raw: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(raw).map_err(|e| PathError::Expansion {
        path: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(project_root.join(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_find_project_root_from_subdirectory() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("stoke")).unwrap();
        let nested = dir.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, dunce::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_find_project_root_with_manifest_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILENAME), "").unwrap();
        assert!(find_project_root(dir.path()).is_ok());
    }

    #[test]
    fn test_project_paths() {
        let root = Path::new("/work/app");
        assert_eq!(project_config_path(root), Path::new("/work/app/stoke/config.toml"));
        assert_eq!(project_data_path(root), Path::new("/work/app/stoke/project.json"));
        assert_eq!(error_dump_path(root, "sh"), Path::new("/work/app/stoke_error_dump.sh"));
    }

    #[test]
    fn test_resolve_project_path() {
        let root = Path::new("/work/app");
        assert_eq!(
            resolve_project_path(root, "bin/app").unwrap(),
            Path::new("/work/app/bin/app")
        );
        assert_eq!(
            resolve_project_path(root, "/tmp/out").unwrap(),
            Path::new("/tmp/out")
        );
    }
}
