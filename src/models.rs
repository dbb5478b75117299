// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// --- ARGUMENT MODELS ---

/// The closed set of types an argument may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    String,
    Int,
    Bool,
    Float,
}

impl ArgType {
    /// Maps a type token from a declaration (`Int`, `String`, ...) to its variant.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "String" => Some(Self::String),
            "Int" => Some(Self::Int),
            "Bool" => Some(Self::Bool),
            "Float" => Some(Self::Float),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::Float => "Float",
        }
    }

    /// Returns true if `value` parses as this type.
    /// Booleans only accept the literals `true` and `false`.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Self::String => true,
            Self::Int => value.parse::<i64>().is_ok(),
            Self::Bool => value.parse::<bool>().is_ok(),
            Self::Float => value.parse::<f64>().is_ok(),
        }
    }

    /// The value substituted for an optional argument without a default.
    pub fn zero_value(self) -> &'static str {
        match self {
            Self::String => "",
            Self::Int => "0",
            Self::Bool => "false",
            Self::Float => "0.0",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed argument declared by a command, e.g. `retries:Int?=3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgument {
    pub name: String,
    pub arg_type: ArgType,
    pub optional: bool,
    /// Only ever `Some` for optional arguments.
    pub default_value: Option<String>,
}

impl fmt::Display for CommandArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.arg_type)?;
        if self.optional {
            f.write_str("?")?;
        }
        if let Some(default) = &self.default_value {
            write!(f, "={}", default)?;
        }
        Ok(())
    }
}

/// A reference to another command plus the parameters bound to it,
/// e.g. `configure release` inside a chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencySpec {
    pub name: String,
    pub params: Vec<String>,
}

impl DependencySpec {
    /// Splits a `name [param]*` segment on whitespace.
    /// Returns `None` for a blank segment.
    pub fn parse(segment: &str) -> Option<Self> {
        let mut fields = segment.split_whitespace();
        let name = fields.next()?.to_string();
        Some(Self {
            name,
            params: fields.map(str::to_string).collect(),
        })
    }

    /// Parses a `->`-separated chain such as `clean -> build release`.
    /// On an empty segment, returns its 0-based position as the error.
    pub fn parse_chain(text: &str) -> Result<Vec<Self>, usize> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        text.split(crate::constants::CHAIN_SEPARATOR)
            .enumerate()
            .map(|(index, segment)| Self::parse(segment).ok_or(index))
            .collect()
    }

    /// Parses a comma-separated list such as `codegen, assets web`.
    /// Blank entries are skipped.
    pub fn parse_list(text: &str) -> Vec<Self> {
        text.split(',').filter_map(Self::parse).collect()
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        Ok(())
    }
}

// --- COMMAND GRAPH MODELS ---

/// Everything a script header declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderData {
    pub help: String,
    pub description: String,
    pub manual: String,
    pub arguments: Vec<CommandArgument>,
    pub chain: Vec<DependencySpec>,
    pub dependencies: Vec<DependencySpec>,
    pub outputs: Vec<String>,
    pub build_number: bool,
    pub is_async: bool,
}

/// A resolved unit of work. Immutable once it is stored in the command graph.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub name: String,
    /// Script backing the command. `None` for inline manifest commands.
    pub path: Option<PathBuf>,
    pub language: String,
    pub arguments: Vec<CommandArgument>,
    pub description: String,
    pub help: String,
    pub manual: String,
    pub dependency_specs: Vec<DependencySpec>,
    pub chain_specs: Vec<DependencySpec>,
    pub outputs: Vec<String>,
    pub build_number: bool,
    pub is_async: bool,
    /// Inline script body from the manifest's `exec` field.
    pub exec: Option<String>,
    /// Commands that run before this one, in order.
    pub chain: Vec<CommandRef>,
    /// Commands whose outputs must exist before this one runs.
    pub dependencies: Vec<CommandRef>,
}

impl Command {
    pub fn mandatory_argument_count(&self) -> usize {
        self.arguments.iter().filter(|a| !a.optional).count()
    }

    pub fn argument(&self, name: &str) -> Option<&CommandArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// A command as it is referenced from a chain or an invocation: the shared
/// graph entry plus the parameters bound at this particular use site.
#[derive(Debug, Clone)]
pub struct CommandRef {
    pub command: Arc<Command>,
    pub params: Vec<String>,
}

impl CommandRef {
    pub fn plain(command: Arc<Command>) -> Self {
        Self {
            command,
            params: Vec::new(),
        }
    }

    /// Binds `params` to `command` without touching the shared entry.
    pub fn instantiate(command: Arc<Command>, params: Vec<String>) -> Self {
        Self { command, params }
    }

    pub fn name(&self) -> &str {
        &self.command.name
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        Ok(())
    }
}

// --- `Stokefile.toml` MODELS ---

/// A global variable value from the manifest. Kept in its TOML type so it can
/// be rendered bare or quoted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum GlobalValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// The deserialized structure of a `Stokefile.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    pub language: Option<String>,
    pub startup_hook: Option<String>,
    pub exit_hook: Option<String>,
    #[serde(default)]
    pub globals: BTreeMap<String, GlobalValue>,
    #[serde(default)]
    pub commands: BTreeMap<String, ManifestCommand>,
}

/// One `[commands.<name>]` table.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ManifestCommand {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub help: String,
    pub language: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Comma-separated dependency specifications.
    pub dependencies: Option<String>,
    /// `->`-separated command chain.
    pub chain: Option<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, rename = "buildNumber")]
    pub build_number: bool,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    pub exec: Option<String>,
    pub path: Option<String>,
    pub extends: Option<String>,
}

// --- CONFIGURATION AND PERSISTED DATA ---

/// Settings read from `stoke/config.toml` (or the global config file).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Rewrite malformed header lines and missing shebangs in place.
    pub fix_parse_errors: bool,
    /// How often a command may repeat within one resolution chain.
    pub recursion_depth: usize,
    /// Pass the interpreter's stop-on-error flag (`-e` for bash).
    pub stop_on_error: bool,
    pub dump_script_on_error: bool,
    pub print_script_on_error: bool,
    pub debug: bool,
    pub colors: bool,
    /// Suppress the `[current/total]` progress lines.
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fix_parse_errors: true,
            recursion_depth: 1,
            stop_on_error: true,
            dump_script_on_error: true,
            print_script_on_error: false,
            debug: false,
            colors: true,
            quiet: false,
        }
    }
}

/// Data persisted across runs in `stoke/project.json`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectData {
    #[serde(default)]
    pub build_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_with_params() {
        let chain = DependencySpec::parse_chain("clean -> build release  -> test").unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1].name, "build");
        assert_eq!(chain[1].params, vec!["release".to_string()]);
        assert_eq!(chain[2].to_string(), "test");
    }

    #[test]
    fn test_parse_chain_reports_empty_segment() {
        assert_eq!(DependencySpec::parse_chain("a -> -> b"), Err(1));
        assert_eq!(DependencySpec::parse_chain("a ->"), Err(1));
        assert_eq!(DependencySpec::parse_chain("  "), Ok(Vec::new()));
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        let deps = DependencySpec::parse_list("codegen, , assets web");
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].to_string(), "assets web");
    }

    #[test]
    fn test_arg_type_accepts() {
        assert!(ArgType::Int.accepts("-12"));
        assert!(!ArgType::Int.accepts("1.5"));
        assert!(ArgType::Float.accepts("3.14"));
        assert!(!ArgType::Bool.accepts("TRUE"));
        assert!(ArgType::String.accepts(""));
    }

    #[test]
    fn test_config_defaults_and_unknown_keys() {
        let config: Config = toml::from_str("recursion_depth = 3").unwrap();
        assert_eq!(config.recursion_depth, 3);
        assert!(config.fix_parse_errors);
        assert!(config.stop_on_error);

        let err = toml::from_str::<Config>("recursion = 3").unwrap_err();
        assert!(err.to_string().contains("unknown field `recursion`"));
    }
}
