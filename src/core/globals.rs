// src/core/globals.rs

//! Project-wide globals: an optional `stoke/globals.<ext>` script plus the
//! `[globals]` table of the manifest. Both are prepended to every assembled
//! script, and their names are reserved so arguments cannot shadow them.

use crate::{
    constants::GLOBALS_FILE_STEM,
    core::language::{self, Language},
    models::GlobalValue,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

lazy_static! {
    // `NAME=`, `export NAME=`, `var NAME =`, `$NAME =` ...
    static ref ASSIGNMENT_RE: Regex = Regex::new(
        r"^[ \t]*(?:export[ \t]+|declare[ \t]+(?:-[A-Za-z]+[ \t]+)?|readonly[ \t]+|var[ \t]+|let[ \t]+|const[ \t]+|\$)?([A-Za-z_][A-Za-z0-9_]*)[ \t]*="
    )
    .expect("assignment regex is valid");
}

#[derive(Error, Debug)]
pub enum GlobalsError {
    #[error("could not read globals script '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
struct GlobalsScript {
    path: PathBuf,
    language: &'static Language,
    content: String,
}

#[derive(Debug, Clone, Default)]
pub struct Globals {
    script: Option<GlobalsScript>,
    vars: BTreeMap<String, GlobalValue>,
    names: HashSet<String>,
}

impl Globals {
    /// Loads `globals.<ext>` from `stoke_dir` (if present) and merges the
    /// manifest variables.
    pub fn load(
        stoke_dir: &Path,
        manifest_vars: &BTreeMap<String, GlobalValue>,
    ) -> Result<Self, GlobalsError> {
        let script = find_globals_script(stoke_dir)
            .map(|(path, language)| {
                let mut content = fs::read_to_string(&path).map_err(|e| GlobalsError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                if !content.ends_with('\n') {
                    content.push('\n');
                }
                Ok::<_, GlobalsError>(GlobalsScript {
                    path,
                    language,
                    content,
                })
            })
            .transpose()?;

        Ok(Self::from_parts(script, manifest_vars.clone()))
    }

    fn from_parts(script: Option<GlobalsScript>, vars: BTreeMap<String, GlobalValue>) -> Self {
        let mut names: HashSet<String> = vars.keys().cloned().collect();
        if let Some(script) = &script {
            names.extend(assigned_names(&script.content, script.language));
            log::debug!(
                "Loaded globals script '{}' ({} names)",
                script.path.display(),
                names.len()
            );
        }
        Self {
            script,
            vars,
            names,
        }
    }

    /// Names that command arguments must not reuse.
    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    pub fn script_path(&self) -> Option<&Path> {
        self.script.as_ref().map(|s| s.path.as_path())
    }

    /// The text prepended to a script in `language`. The globals script is
    /// only included for scripts of its own language.
    pub fn prelude(&self, language: &Language) -> String {
        let mut prelude: String = self
            .vars
            .iter()
            .map(|(name, value)| language.global_assignment(name, value))
            .collect();
        if let Some(script) = &self.script
            && script.language.name == language.name
        {
            prelude.push_str(strip_shebang(&script.content));
        }
        prelude
    }
}

fn find_globals_script(stoke_dir: &Path) -> Option<(PathBuf, &'static Language)> {
    language::all().iter().find_map(|language| {
        let path = stoke_dir.join(format!("{}.{}", GLOBALS_FILE_STEM, language.file_extension));
        path.is_file().then_some((path, language))
    })
}

fn strip_shebang(content: &str) -> &str {
    if content.starts_with("#!") {
        content.split_once('\n').map_or("", |(_, rest)| rest)
    } else {
        content
    }
}

/// Collects the variable names assigned at the start of a line.
fn assigned_names(content: &str, language: &Language) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with(language.comment))
        .filter_map(|line| ASSIGNMENT_RE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
