// src/core/manifest.rs

//! # Manifest
//!
//! Loads and validates `Stokefile.toml`, the declarative alternative to
//! script headers. Each `[commands.<name>]` table becomes a [`Command`] with
//! the same semantics as a script. A command may `extends` another one, in
//! which case it inherits the base's arguments, outputs, dependencies and
//! flags.

use crate::{
    core::{
        arg_decl::{self, DeclarationError},
        language::{self, Language},
    },
    models::{Command, DependencySpec, ManifestCommand, ManifestFile},
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("could not read manifest '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown language '{language}' in manifest")]
    UnknownLanguage { language: String },
    #[error("command '{0}' sets both 'path' and 'exec'")]
    PathAndExec(String),
    #[error("command '{0}' depends on itself")]
    SelfDependency(String),
    #[error("command '{command}' extends unknown command '{base}'")]
    UnknownBase { command: String, base: String },
    #[error("command '{0}' has a circular 'extends' chain")]
    CircularExtends(String),
    #[error("command '{command}': empty command at position {index} of the chain")]
    InvalidChain { command: String, index: usize },
    #[error("command '{command}': {source}")]
    Arguments {
        command: String,
        #[source]
        source: DeclarationError,
    },
}

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    file: ManifestFile,
    language: &'static Language,
}

impl Manifest {
    /// Loads the manifest at `path`. Returns `Ok(None)` if there is none.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(path, &content).map(Some)
    }

    /// Parses and validates manifest `content`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ManifestError> {
        let file: ManifestFile = toml::from_str(content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;

        let language = resolve_language(file.language.as_deref())?;
        let manifest = Self {
            path: path.to_path_buf(),
            file,
            language,
        };
        manifest.validate()?;
        log::debug!(
            "Loaded manifest '{}' with {} commands",
            manifest.path.display(),
            manifest.file.commands.len()
        );
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        let global_names: HashSet<String> = self.file.globals.keys().cloned().collect();
        for name in self.file.commands.keys() {
            let effective = self.effective(name)?;
            if effective.path.is_some() && effective.exec.is_some() {
                return Err(ManifestError::PathAndExec(name.clone()));
            }
            resolve_language(effective.language.as_deref().or(self.file.language.as_deref()))?;

            let dependencies = effective
                .dependencies
                .as_deref()
                .map(DependencySpec::parse_list)
                .unwrap_or_default();
            let chain = parse_chain(name, effective.chain.as_deref())?;
            if dependencies.iter().chain(chain.iter()).any(|d| &d.name == name) {
                return Err(ManifestError::SelfDependency(name.clone()));
            }

            arg_decl::parse_declarations(&effective.arguments, &global_names).map_err(|source| {
                ManifestError::Arguments {
                    command: name.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &ManifestFile {
        &self.file
    }

    pub fn language(&self) -> &'static Language {
        self.language
    }

    pub fn contains(&self, name: &str) -> bool {
        self.file.commands.contains_key(name)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.file.commands.keys().map(String::as_str)
    }

    pub fn startup_hook(&self) -> Option<&str> {
        self.file.startup_hook.as_deref()
    }

    pub fn exit_hook(&self) -> Option<&str> {
        self.file.exit_hook.as_deref()
    }

    /// The command table with its `extends` chain applied.
    pub fn effective(&self, name: &str) -> Result<ManifestCommand, ManifestError> {
        let mut visited = HashSet::new();
        self.effective_inner(name, &mut visited)
    }

    fn effective_inner(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Result<ManifestCommand, ManifestError> {
        if !visited.insert(name.to_string()) {
            return Err(ManifestError::CircularExtends(name.to_string()));
        }
        let own = self
            .file
            .commands
            .get(name)
            .cloned()
            .unwrap_or_default();

        let Some(base_name) = own.extends.clone() else {
            return Ok(own);
        };
        if !self.file.commands.contains_key(&base_name) {
            return Err(ManifestError::UnknownBase {
                command: name.to_string(),
                base: base_name,
            });
        }
        let base = self.effective_inner(&base_name, visited)?;
        Ok(merge(base, own))
    }

    /// Builds the unresolved [`Command`] for manifest entry `name`. Chain and
    /// dependency references are left for the job coordinator to resolve.
    pub fn build_command(
        &self,
        name: &str,
        global_names: &HashSet<String>,
        project_root: &Path,
    ) -> Result<Command, ManifestError> {
        let entry = self.effective(name)?;
        let language =
            resolve_language(entry.language.as_deref().or(self.file.language.as_deref()))?;
        let arguments = arg_decl::parse_declarations(&entry.arguments, global_names).map_err(
            |source| ManifestError::Arguments {
                command: name.to_string(),
                source,
            },
        )?;

        let path = entry.path.as_deref().map(|raw| {
            let expanded = shellexpand::full(raw)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            project_root.join(expanded)
        });

        Ok(Command {
            name: name.to_string(),
            path,
            language: language.name.to_string(),
            arguments,
            description: entry.description,
            help: entry.help,
            manual: String::new(),
            dependency_specs: entry
                .dependencies
                .as_deref()
                .map(DependencySpec::parse_list)
                .unwrap_or_default(),
            chain_specs: parse_chain(name, entry.chain.as_deref())?,
            outputs: entry.outputs,
            build_number: entry.build_number,
            is_async: entry.is_async,
            exec: entry.exec,
            chain: Vec::new(),
            dependencies: Vec::new(),
        })
    }
}

fn resolve_language(name: Option<&str>) -> Result<&'static Language, ManifestError> {
    let name = name.unwrap_or(language::DEFAULT_LANGUAGE);
    language::by_name(name).ok_or_else(|| ManifestError::UnknownLanguage {
        language: name.to_string(),
    })
}

fn parse_chain(command: &str, chain: Option<&str>) -> Result<Vec<DependencySpec>, ManifestError> {
    DependencySpec::parse_chain(chain.unwrap_or_default()).map_err(|index| {
        ManifestError::InvalidChain {
            command: command.to_string(),
            index,
        }
    })
}

/// Layers `own` on top of `base`. Own arguments replace base arguments of
/// the same name; outputs and dependencies are appended to the base ones.
fn merge(base: ManifestCommand, own: ManifestCommand) -> ManifestCommand {
    let declared_name = |decl: &str| decl.split(':').next().unwrap_or_default().trim().to_string();
    let own_names: HashSet<String> = own.arguments.iter().map(|d| declared_name(d.as_str())).collect();
    let mut arguments: Vec<String> = base
        .arguments
        .into_iter()
        .filter(|d| !own_names.contains(&declared_name(d.as_str())))
        .collect();
    arguments.extend(own.arguments);

    let mut outputs = base.outputs;
    outputs.extend(own.outputs);

    let dependencies = match (base.dependencies, own.dependencies) {
        (Some(b), Some(o)) => Some(format!("{}, {}", b, o)),
        (b, o) => o.or(b),
    };

    let non_empty = |s: String, fallback: String| if s.is_empty() { fallback } else { s };

    ManifestCommand {
        description: non_empty(own.description, base.description),
        help: non_empty(own.help, base.help),
        language: own.language.or(base.language),
        arguments,
        dependencies,
        chain: own.chain.or(base.chain),
        outputs,
        build_number: own.build_number || base.build_number,
        is_async: own.is_async || base.is_async,
        exec: own.exec.or(if own.path.is_some() { None } else { base.exec }),
        path: own.path.or(base.path),
        extends: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArgType;
    use tempfile::tempdir;

    fn parse(content: &str) -> Result<Manifest, ManifestError> {
        Manifest::parse(Path::new("Stokefile.toml"), content)
    }

    const BASIC: &str = r#"
language = "bash"

[globals]
VERSION = "1.2.0"
PORT = 8080

[commands.build]
description = "build the app"
arguments = ["target:String", "mode:String?=debug"]
dependencies = "codegen, assets web"
chain = "clean"
outputs = ["bin/app"]
buildNumber = true
exec = "go build -o bin/app"

[commands.clean]
exec = "rm -rf bin"

[commands.codegen]
exec = "true"

[commands.assets]
arguments = ["kind:String"]
exec = "echo $kind"
"#;

    // --- Loading Tests ---

    #[test]
    fn test_parse_and_build_command() {
        let manifest = parse(BASIC).unwrap();
        assert_eq!(manifest.language().name, "bash");
        assert_eq!(manifest.command_names().count(), 4);

        let cmd = manifest
            .build_command("build", &HashSet::new(), Path::new("/project"))
            .unwrap();
        assert_eq!(cmd.arguments.len(), 2);
        assert_eq!(cmd.arguments[0].arg_type, ArgType::String);
        assert_eq!(cmd.dependency_specs.len(), 2);
        assert_eq!(cmd.dependency_specs[1].params, vec!["web".to_string()]);
        assert_eq!(cmd.chain_specs[0].name, "clean");
        assert!(cmd.build_number);
        assert!(cmd.path.is_none());
        assert_eq!(cmd.exec.as_deref(), Some("go build -o bin/app"));
    }

    #[test]
    fn test_missing_manifest_is_none() {
        let dir = tempdir().unwrap();
        assert!(Manifest::load(&dir.path().join("Stokefile.toml")).unwrap().is_none());
    }

    #[test]
    fn test_path_is_joined_to_project_root() {
        let manifest = parse("[commands.lint]\npath = \"tools/lint.sh\"\n").unwrap();
        let cmd = manifest
            .build_command("lint", &HashSet::new(), Path::new("/project"))
            .unwrap();
        assert_eq!(cmd.path, Some(PathBuf::from("/project/tools/lint.sh")));
        assert_eq!(cmd.language, "bash");
    }

    // --- Validation Tests ---

    #[test]
    fn test_unknown_command_field_rejected() {
        let err = parse("[commands.a]\nexec = \"x\"\nruns = \"y\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().contains("unknown field `runs`"));
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let err = parse("name = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown field `name`"));
    }

    #[test]
    fn test_duplicate_command_rejected() {
        let err = parse("[commands.a]\nexec = \"x\"\n[commands.a]\nexec = \"y\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_global_rejected() {
        let err = parse("[globals]\nA = 1\nA = 2\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_path_and_exec_rejected() {
        let err = parse("[commands.a]\nexec = \"x\"\npath = \"a.sh\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::PathAndExec(name) if name == "a"));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let err = parse("[commands.a]\ndependencies = \"b, a\"\n[commands.b]\n").unwrap_err();
        assert!(matches!(err, ManifestError::SelfDependency(name) if name == "a"));
        let err = parse("[commands.a]\nchain = \"a\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::SelfDependency(_)));
    }

    #[test]
    fn test_unknown_language_rejected() {
        let err = parse("language = \"cobol\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownLanguage { .. }));
    }

    #[test]
    fn test_argument_conflicting_with_global_rejected() {
        let err = parse("[globals]\nmode = \"x\"\n[commands.a]\narguments = [\"mode:String\"]\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Arguments {
                source: DeclarationError::NameConflict(_),
                ..
            }
        ));
    }

    // --- Extends Tests ---

    #[test]
    fn test_extends_merges_base() {
        let manifest = parse(
            r#"
[commands.base]
help = "base help"
arguments = ["a:Int", "b:String?"]
outputs = ["out/base"]
dependencies = "gen"
buildNumber = true
exec = "echo base"

[commands.child]
arguments = ["b:Int?=2"]
outputs = ["out/child"]
dependencies = "lint"
extends = "base"

[commands.gen]
[commands.lint]
"#,
        )
        .unwrap();
        let cmd = manifest
            .build_command("child", &HashSet::new(), Path::new("."))
            .unwrap();
        assert_eq!(cmd.help, "base help");
        let names: Vec<_> = cmd.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(cmd.arguments[1].arg_type, ArgType::Int);
        assert_eq!(cmd.outputs, vec!["out/base".to_string(), "out/child".to_string()]);
        let deps: Vec<_> = cmd.dependency_specs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(deps, vec!["gen", "lint"]);
        assert!(cmd.build_number);
        assert_eq!(cmd.exec.as_deref(), Some("echo base"));
    }

    #[test]
    fn test_extends_unknown_base() {
        let err = parse("[commands.a]\nextends = \"nope\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownBase { .. }));
    }

    #[test]
    fn test_circular_extends() {
        let err = parse("[commands.a]\nextends = \"b\"\n[commands.b]\nextends = \"a\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::CircularExtends(_)));
    }
}
