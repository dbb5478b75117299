// src/core/header_parser.rs

//! # Script Header Parser
//!
//! Extracts command metadata from the leading comment block of a script:
//!
//! ```text
//! #!/bin/bash
//! # ----------------------------------------
//! # @stoke-help: build the application
//! # @stoke-args: target:String mode:String?=debug
//! # @stoke-chain: clean -> configure release
//! # @stoke-outputs: bin/app
//! # ----------------------------------------
//! # Free text manual.
//! # ----------------------------------------
//! ```
//!
//! Lines that look like a field marker but do not follow the canonical form
//! (`#@stoke-help x`, `# stoke-help:: x`) are reported as malformed. With
//! auto-fix enabled, [`parse_script`] rewrites them through
//! [`crate::core::sanitize`] and parses the file one more time.

use crate::{
    constants::{HEADER_NAMESPACE, SEPARATOR_MIN_DASHES},
    core::{
        arg_decl::{self, DeclarationError},
        language::Language,
        sanitize, snippet,
    },
    models::{DependencySpec, HeaderData},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// The compiled patterns for one family of line comments.
#[derive(Debug)]
pub(crate) struct FieldPatterns {
    pub(crate) strict: Regex,
    pub(crate) loose: Regex,
    pub(crate) separator: Regex,
}

impl FieldPatterns {
    fn for_comment(comment_re: &str) -> Self {
        let ns = HEADER_NAMESPACE;
        let field = r"([a-z]+(?:-[a-z]+)*)";
        Self {
            strict: Regex::new(&format!(
                r"^{comment_re}[ \t]+@{ns}-{field}(?::[ \t]*(.*?))?[ \t]*$"
            ))
            .expect("strict header regex is valid"),
            loose: Regex::new(&format!(
                r"^[ \t]*(?:{comment_re})?[ \t]*@*{ns}-{field}[ \t]*:*[ \t]*(.*?)[ \t]*$"
            ))
            .expect("loose header regex is valid"),
            separator: Regex::new(&format!(
                r"^{comment_re}[ \t]*-{{{SEPARATOR_MIN_DASHES},}}[ \t]*(?:{comment_re})?[ \t]*$"
            ))
            .expect("separator regex is valid"),
        }
    }
}

lazy_static! {
    static ref HASH_PATTERNS: FieldPatterns = FieldPatterns::for_comment("#+");
    static ref SLASH_PATTERNS: FieldPatterns = FieldPatterns::for_comment("//+");
}

pub(crate) fn patterns_for(language: &Language) -> &'static FieldPatterns {
    if language.comment.starts_with('/') {
        &SLASH_PATTERNS
    } else {
        &HASH_PATTERNS
    }
}

/// The fields a header may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    Help,
    Description,
    Args,
    Chain,
    Deps,
    Outputs,
    BuildNumber,
    Async,
}

impl HeaderField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "help" => Some(Self::Help),
            "description" => Some(Self::Description),
            "args" => Some(Self::Args),
            "chain" => Some(Self::Chain),
            "deps" => Some(Self::Deps),
            "outputs" => Some(Self::Outputs),
            "build-number" => Some(Self::BuildNumber),
            "async" => Some(Self::Async),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Description => "description",
            Self::Args => "args",
            Self::Chain => "chain",
            Self::Deps => "deps",
            Self::Outputs => "outputs",
            Self::BuildNumber => "build-number",
            Self::Async => "async",
        }
    }
}

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("could not read script '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: missing shebang, expected '{expected}' on line 1\n{snippet}")]
    MissingShebang {
        path: String,
        expected: String,
        snippet: String,
    },
    #[error("{path}:{line}: malformed header field '{field}'\n{snippet}")]
    MalformedField {
        path: String,
        line: usize,
        field: String,
        snippet: String,
    },
    #[error("{path}:{line}: unknown header field '{field}'\n{snippet}")]
    UnknownHeaderField {
        path: String,
        line: usize,
        field: String,
        snippet: String,
    },
    #[error("{path}:{line}: header field '{field}' appears more than once (first on line {first})\n{snippet}")]
    DuplicateHeaderField {
        path: String,
        line: usize,
        first: usize,
        field: String,
        snippet: String,
    },
    #[error("{path}:{line}: empty command at position {index} of the chain\n{snippet}")]
    InvalidChain {
        path: String,
        line: usize,
        index: usize,
        snippet: String,
    },
    #[error("{path}:{line}: flag '{field}' takes no value or true/false, got '{value}'\n{snippet}")]
    InvalidFlag {
        path: String,
        line: usize,
        field: String,
        value: String,
        snippet: String,
    },
    #[error("{path}:{line}: {source}\n{snippet}")]
    Arguments {
        path: String,
        line: usize,
        #[source]
        source: DeclarationError,
        snippet: String,
    },
}

impl HeaderError {
    /// Errors the sanitizer knows how to repair.
    pub fn is_fixable(&self) -> bool {
        matches!(self, Self::MissingShebang { .. } | Self::MalformedField { .. })
    }

    /// The 1-based line the error points at.
    pub fn line(&self) -> usize {
        match self {
            Self::Io { .. } | Self::MissingShebang { .. } => 1,
            Self::MalformedField { line, .. }
            | Self::UnknownHeaderField { line, .. }
            | Self::DuplicateHeaderField { line, .. }
            | Self::InvalidChain { line, .. }
            | Self::InvalidFlag { line, .. }
            | Self::Arguments { line, .. } => *line,
        }
    }
}

/// How a single line of the header region is classified.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HeaderLine<'a> {
    Blank,
    Separator,
    Field { name: &'a str, value: &'a str },
    /// Looks like a known field but is not written canonically.
    Malformed { name: &'a str, value: &'a str },
    Comment(&'a str),
    /// First line of the script body.
    End,
}

pub(crate) fn classify<'a>(line: &'a str, language: &Language) -> HeaderLine<'a> {
    let patterns = patterns_for(language);
    if line.trim().is_empty() {
        return HeaderLine::Blank;
    }
    if patterns.separator.is_match(line) {
        return HeaderLine::Separator;
    }
    if let Some(caps) = patterns.strict.captures(line) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str());
        return HeaderLine::Field { name, value };
    }
    if let Some(caps) = patterns.loose.captures(line) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        // Prose that merely mentions `stoke-something` is left alone.
        if HeaderField::from_name(name).is_some() {
            let value = caps.get(2).map_or("", |m| m.as_str());
            return HeaderLine::Malformed { name, value };
        }
    }
    match line.trim_start().strip_prefix(language.comment) {
        Some(rest) => {
            let rest = rest.trim_start_matches(language.comment);
            HeaderLine::Comment(rest.strip_prefix(' ').unwrap_or(rest))
        }
        None => HeaderLine::End,
    }
}

/// Reads and parses the header of the script at `path`.
///
/// With `fix_parse_errors`, a missing shebang or malformed field lines are
/// rewritten in place and the file is parsed a second time. Any error from
/// the second attempt is returned as is.
pub fn parse_script(
    path: &Path,
    language: &Language,
    global_names: &HashSet<String>,
    fix_parse_errors: bool,
) -> Result<HeaderData, HeaderError> {
    let display_path = path.display().to_string();
    let read = |p: &Path| {
        fs::read_to_string(p).map_err(|e| HeaderError::Io {
            path: display_path.clone(),
            source: e,
        })
    };

    let content = read(path)?;
    match parse_header(&display_path, &content, language, global_names) {
        Err(e) if fix_parse_errors && e.is_fixable() => {
            let fixed = sanitize::sanitize(&content, language);
            if fixed == content {
                return Err(e);
            }
            log::warn!("Fixing header of '{}' (line {}).", display_path, e.line());
            fs::write(path, &fixed).map_err(|source| HeaderError::Io {
                path: display_path.clone(),
                source,
            })?;
            parse_header(&display_path, &fixed, language, global_names)
        }
        result => result,
    }
}

/// Parses header `content`. `path` is only used in error messages.
pub fn parse_header(
    path: &str,
    content: &str,
    language: &Language,
    global_names: &HashSet<String>,
) -> Result<HeaderData, HeaderError> {
    let lines: Vec<&str> = content.lines().collect();

    let first_line = lines.first().map(|l| l.trim_end()).unwrap_or_default();
    if first_line != language.shebang {
        return Err(HeaderError::MissingShebang {
            path: path.to_string(),
            expected: language.shebang.to_string(),
            snippet: snippet::render(content, 1),
        });
    }

    let mut data = HeaderData::default();
    let mut seen: HashMap<HeaderField, usize> = HashMap::new();

    // Text since the last separator, and whether that block held any field.
    let mut block: Option<Vec<&str>> = None;
    let mut block_has_fields = false;
    let mut manual_found = false;

    for (index, raw_line) in lines.iter().enumerate().skip(1) {
        let line_no = index + 1;
        match classify(raw_line, language) {
            HeaderLine::End => break,
            HeaderLine::Blank => {
                if let Some(block_lines) = block.as_mut() {
                    block_lines.push("");
                }
            }
            HeaderLine::Comment(text) => {
                if let Some(block_lines) = block.as_mut() {
                    block_lines.push(text);
                }
            }
            HeaderLine::Separator => {
                if let Some(text) = block.take()
                    && !block_has_fields
                    && !manual_found
                    && text.iter().any(|l| !l.trim().is_empty())
                {
                    data.manual = text.join("\n").trim_matches('\n').to_string();
                    manual_found = true;
                }
                block = Some(Vec::new());
                block_has_fields = false;
            }
            HeaderLine::Malformed { name, .. } => {
                return Err(HeaderError::MalformedField {
                    path: path.to_string(),
                    line: line_no,
                    field: name.to_string(),
                    snippet: snippet::render(content, line_no),
                });
            }
            HeaderLine::Field { name, value } => {
                block_has_fields = true;
                let field =
                    HeaderField::from_name(name).ok_or_else(|| HeaderError::UnknownHeaderField {
                        path: path.to_string(),
                        line: line_no,
                        field: name.to_string(),
                        snippet: snippet::render(content, line_no),
                    })?;
                if let Some(first) = seen.insert(field, line_no) {
                    return Err(HeaderError::DuplicateHeaderField {
                        path: path.to_string(),
                        line: line_no,
                        first,
                        field: field.name().to_string(),
                        snippet: snippet::render(content, line_no),
                    });
                }
                log::trace!("{}:{}: field '{}' = '{}'", path, line_no, name, value);
                apply_field(&mut data, field, value, global_names).map_err(|e| {
                    e.into_header_error(path, line_no, field, value, snippet::render(content, line_no))
                })?;
            }
        }
    }

    Ok(data)
}

/// Why a field value was rejected, before path and line are attached.
enum FieldError {
    Chain(usize),
    Flag,
    Arguments(DeclarationError),
}

impl FieldError {
    fn into_header_error(
        self,
        path: &str,
        line: usize,
        field: HeaderField,
        value: &str,
        snippet: String,
    ) -> HeaderError {
        let path = path.to_string();
        match self {
            Self::Chain(index) => HeaderError::InvalidChain {
                path,
                line,
                index,
                snippet,
            },
            Self::Flag => HeaderError::InvalidFlag {
                path,
                line,
                field: field.name().to_string(),
                value: value.to_string(),
                snippet,
            },
            Self::Arguments(source) => HeaderError::Arguments {
                path,
                line,
                source,
                snippet,
            },
        }
    }
}

fn parse_flag(value: &str) -> Result<bool, FieldError> {
    match value {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(FieldError::Flag),
    }
}

fn apply_field(
    data: &mut HeaderData,
    field: HeaderField,
    value: &str,
    global_names: &HashSet<String>,
) -> Result<(), FieldError> {
    match field {
        HeaderField::Help => data.help = value.to_string(),
        HeaderField::Description => data.description = value.to_string(),
        HeaderField::Args => {
            let declarations: Vec<&str> = value.split_whitespace().collect();
            data.arguments = arg_decl::parse_declarations(&declarations, global_names)
                .map_err(FieldError::Arguments)?;
        }
        HeaderField::Chain => {
            data.chain = DependencySpec::parse_chain(value).map_err(FieldError::Chain)?;
        }
        HeaderField::Deps => data.dependencies = DependencySpec::parse_list(value),
        HeaderField::Outputs => {
            data.outputs = value
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        HeaderField::BuildNumber => data.build_number = parse_flag(value)?,
        HeaderField::Async => data.is_async = parse_flag(value)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::language;
    use crate::models::ArgType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn bash() -> &'static Language {
        language::by_name("bash").unwrap()
    }

    fn parse(content: &str) -> Result<HeaderData, HeaderError> {
        parse_header("test.sh", content, bash(), &HashSet::new())
    }

    const FULL_HEADER: &str = "#!/bin/bash
# ----------------------------------------
# @stoke-help: build the application
# @stoke-args: target:String mode:String?=debug
# @stoke-chain: clean -> configure release
# @stoke-deps: codegen, assets web
# @stoke-outputs: bin/app, bin/app.sym
# @stoke-build-number
# ----------------------------------------
# Builds the app.
#
# Pass target=linux for a linux build.
# ----------------------------------------

echo building
# @stoke-help: not part of the header
";

    // --- Field Extraction Tests ---

    #[test]
    fn test_parse_full_header() {
        let data = parse(FULL_HEADER).unwrap();
        assert_eq!(data.help, "build the application");
        assert_eq!(data.arguments.len(), 2);
        assert_eq!(data.arguments[1].arg_type, ArgType::String);
        assert_eq!(data.arguments[1].default_value.as_deref(), Some("debug"));
        assert_eq!(data.chain.len(), 2);
        assert_eq!(data.chain[1].params, vec!["release".to_string()]);
        assert_eq!(data.dependencies.len(), 2);
        assert_eq!(data.dependencies[1].name, "assets");
        assert_eq!(data.outputs, vec!["bin/app".to_string(), "bin/app.sym".to_string()]);
        assert!(data.build_number);
        assert!(!data.is_async);
        assert_eq!(data.manual, "Builds the app.\n\nPass target=linux for a linux build.");
    }

    #[test]
    fn test_header_without_separators() {
        let data = parse("#!/bin/bash\n# @stoke-help: quick\n# @stoke-async: false\necho hi\n").unwrap();
        assert_eq!(data.help, "quick");
        assert!(data.manual.is_empty());
    }

    #[test]
    fn test_plain_comments_are_ignored() {
        let data = parse("#!/bin/bash\n# just a note\n# @stoke-help: h\n").unwrap();
        assert_eq!(data.help, "h");
    }

    #[test]
    fn test_prose_mentioning_namespace_is_not_a_field() {
        let data = parse("#!/bin/bash\n# stoke-internal helper, see docs\n").unwrap();
        assert_eq!(data, HeaderData::default());
    }

    // --- Error Tests ---

    #[test]
    fn test_missing_shebang() {
        let err = parse("# @stoke-help: h\necho hi\n").unwrap_err();
        assert!(matches!(err, HeaderError::MissingShebang { .. }));
        assert!(err.is_fixable());
    }

    #[test]
    fn test_duplicate_field() {
        let err = parse("#!/bin/bash\n# @stoke-help: a\n# @stoke-help: b\n").unwrap_err();
        assert!(matches!(
            err,
            HeaderError::DuplicateHeaderField { line: 3, first: 2, ref field, .. } if field == "help"
        ));
    }

    #[test]
    fn test_unknown_field() {
        let err = parse("#!/bin/bash\n# @stoke-color: red\n").unwrap_err();
        assert!(matches!(err, HeaderError::UnknownHeaderField { line: 2, .. }));
    }

    #[test]
    fn test_malformed_field_is_reported_with_line() {
        let err = parse("#!/bin/bash\n# @stoke-help: ok\n#@stoke-args x:Int\n").unwrap_err();
        assert!(matches!(err, HeaderError::MalformedField { line: 3, .. }));
        assert!(err.to_string().contains("test.sh:3"));
    }

    #[test]
    fn test_invalid_chain_names_segment() {
        let err = parse("#!/bin/bash\n# @stoke-chain: a -> -> b\n").unwrap_err();
        assert!(matches!(err, HeaderError::InvalidChain { index: 1, .. }));
    }

    #[test]
    fn test_invalid_argument_declaration() {
        let err = parse("#!/bin/bash\n# @stoke-args: a:Int a:Int\n").unwrap_err();
        assert!(matches!(
            err,
            HeaderError::Arguments {
                source: DeclarationError::DuplicateArgumentName(_),
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_flag_value() {
        let err = parse("#!/bin/bash\n# @stoke-build-number: sometimes\n").unwrap_err();
        assert!(matches!(err, HeaderError::InvalidFlag { .. }));
    }

    // --- Auto-fix Tests ---

    #[test]
    fn test_parse_script_fixes_and_reparses() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "# stoke-help build it\n##@stoke-outputs:: out.bin\necho hi\n").unwrap();

        let data = parse_script(file.path(), bash(), &HashSet::new(), true).unwrap();
        assert_eq!(data.help, "build it");
        assert_eq!(data.outputs, vec!["out.bin".to_string()]);

        let rewritten = fs::read_to_string(file.path()).unwrap();
        assert!(rewritten.starts_with("#!/bin/bash\n# @stoke-help: build it\n# @stoke-outputs: out.bin\n"));
    }

    #[test]
    fn test_parse_script_without_fix_reports_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "#!/bin/bash\n#@stoke-help broken\n").unwrap();

        let err = parse_script(file.path(), bash(), &HashSet::new(), false).unwrap_err();
        assert!(matches!(err, HeaderError::MalformedField { .. }));
        let untouched = fs::read_to_string(file.path()).unwrap();
        assert_eq!(untouched, "#!/bin/bash\n#@stoke-help broken\n");
    }

    #[test]
    fn test_unfixable_errors_are_not_retried() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "#!/bin/bash\n# @stoke-help: a\n# @stoke-help: b\n").unwrap();
        let err = parse_script(file.path(), bash(), &HashSet::new(), true).unwrap_err();
        assert!(matches!(err, HeaderError::DuplicateHeaderField { .. }));
    }

    #[test]
    fn test_javascript_comments() {
        let js = language::by_name("javascript").unwrap();
        let content = format!("{}\n// @stoke-help: js task\nconsole.log(1)\n", js.shebang);
        let data = parse_header("t.js", &content, js, &HashSet::new()).unwrap();
        assert_eq!(data.help, "js task");
    }
}
