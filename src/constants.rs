// src/constants.rs

/// The directory (relative to the project root) that holds the command scripts.
pub const STOKE_DIR: &str = "stoke";

/// The declarative manifest file, placed next to the `stoke/` directory.
pub const MANIFEST_FILENAME: &str = "Stokefile.toml";

/// The per-project configuration file (inside `stoke/`).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Persistent project data such as the build counter (inside `stoke/`).
pub const PROJECT_DATA_FILENAME: &str = "project.json";

/// File stem of the project-wide globals script (`stoke/globals.sh`, ...).
pub const GLOBALS_FILE_STEM: &str = "globals";

/// File stem of the script dumped when a command fails.
pub const ERROR_DUMP_FILE_STEM: &str = "stoke_error_dump";

/// Namespace used by header field markers, as in `# @stoke-help: ...`.
pub const HEADER_NAMESPACE: &str = "stoke";

/// Minimum number of dashes forming a manual block separator.
pub const SEPARATOR_MIN_DASHES: usize = 20;

/// Separator between members of a command chain.
pub const CHAIN_SEPARATOR: &str = "->";

/// Names handled by the CLI itself. Scripts with these names are shadowed.
pub const BUILTIN_COMMANDS: &[&str] = &["run", "list", "ls", "info", "graph", "init", "config"];

/// Exit code used when a run is interrupted by a signal.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
