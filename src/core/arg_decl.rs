// src/core/arg_decl.rs

//! Parser for the compact typed-argument grammar shared by script headers and
//! the manifest: `name:Type`, `name:Type?` and `name:Type?=default`.

use crate::models::{ArgType, CommandArgument};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

lazy_static! {
    // Argument names end up as interpreter variables.
    static ref ARG_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("argument name regex is valid");
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("invalid argument declaration '{declaration}': {reason}")]
    InvalidDeclaration { declaration: String, reason: String },
    #[error("unknown type '{type_token}' for argument '{name}' (expected String, Int, Bool or Float)")]
    UnknownArgumentType { name: String, type_token: String },
    #[error("argument '{0}' is declared more than once")]
    DuplicateArgumentName(String),
    #[error("argument '{0}' conflicts with a global variable of the same name")]
    NameConflict(String),
}

fn invalid(declaration: &str, reason: impl Into<String>) -> DeclarationError {
    DeclarationError::InvalidDeclaration {
        declaration: declaration.to_string(),
        reason: reason.into(),
    }
}

/// Parses a single declaration such as `count:Int` or `retries:Int?=3`.
///
/// The optional marker `?` may trail the type token or the whole declaration
/// (`retries:Int=3?`). A default is only accepted on optional arguments and
/// must itself be a valid value of the declared type.
pub fn parse_declaration(raw: &str) -> Result<CommandArgument, DeclarationError> {
    let declaration = raw.trim();
    let (name, type_spec) = declaration
        .split_once(':')
        .ok_or_else(|| invalid(declaration, "expected the form name:Type"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(declaration, "missing argument name"));
    }
    if !ARG_NAME_RE.is_match(name) {
        return Err(invalid(
            declaration,
            "names may only contain letters, digits and underscores",
        ));
    }

    let (type_part, default_part) = match type_spec.split_once('=') {
        Some((t, d)) => (t.trim(), Some(d.trim())),
        None => (type_spec.trim(), None),
    };

    let mut optional = false;
    let type_token = match type_part.strip_suffix('?') {
        Some(stripped) => {
            optional = true;
            stripped.trim_end()
        }
        None => type_part,
    };
    let default_value = default_part.map(|d| match d.strip_suffix('?') {
        Some(stripped) => {
            optional = true;
            stripped.to_string()
        }
        None => d.to_string(),
    });

    let arg_type =
        ArgType::from_token(type_token).ok_or_else(|| DeclarationError::UnknownArgumentType {
            name: name.to_string(),
            type_token: type_token.to_string(),
        })?;

    if let Some(default) = &default_value {
        if !optional {
            return Err(invalid(
                declaration,
                "a default value requires the optional marker '?'",
            ));
        }
        if !arg_type.accepts(default) {
            return Err(invalid(
                declaration,
                format!("default '{}' is not a valid {}", default, arg_type),
            ));
        }
    }

    Ok(CommandArgument {
        name: name.to_string(),
        arg_type,
        optional,
        default_value,
    })
}

/// Parses a list of declarations, enforcing unique names that do not shadow
/// any of the project's global variables. Order is preserved.
pub fn parse_declarations<S: AsRef<str>>(
    declarations: &[S],
    global_names: &HashSet<String>,
) -> Result<Vec<CommandArgument>, DeclarationError> {
    let mut seen = HashSet::new();
    let mut arguments = Vec::with_capacity(declarations.len());

    for raw in declarations {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        let argument = parse_declaration(raw)?;
        if global_names.contains(&argument.name) {
            return Err(DeclarationError::NameConflict(argument.name));
        }
        if !seen.insert(argument.name.clone()) {
            return Err(DeclarationError::DuplicateArgumentName(argument.name));
        }
        log::trace!("Declared argument {}", argument);
        arguments.push(argument);
    }

    Ok(arguments)
}
