// src/core/arg_binder.rs

//! Binds invocation tokens to a command's declared arguments and renders the
//! result as variable declarations for the command's interpreter.
//!
//! Tokens are either labelled (`name=value`) or positional (`value`, bound to
//! the first declared argument not bound yet). A binding lives only for one
//! invocation; the command's declarations are never modified.

use crate::{
    core::language::Language,
    models::{ArgType, Command},
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("malformed argument '{0}': expected name=value")]
    MalformedToken(String),
    #[error("command '{command}' has no argument named '{label}'")]
    UnknownLabel { command: String, label: String },
    #[error("argument '{0}' appeared more than once")]
    DuplicateLabel(String),
    #[error("invalid value '{value}' for argument '{label}': expected {expected}")]
    InvalidArgumentType {
        label: String,
        value: String,
        expected: ArgType,
    },
    #[error("missing argument '{name}' of type {arg_type}")]
    MissingArgument { name: String, arg_type: ArgType },
    #[error("too many arguments for '{command}': expected at most {expected}, got {given}")]
    TooManyArguments {
        command: String,
        expected: usize,
        given: usize,
    },
    #[error("not enough arguments for '{command}': expected at least {expected}, got {given}")]
    NotEnoughArguments {
        command: String,
        expected: usize,
        given: usize,
    },
}

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Supplied,
    Default,
    ZeroValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundValue {
    pub name: String,
    pub arg_type: ArgType,
    pub value: String,
    pub source: ValueSource,
}

/// The values of one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArguments {
    values: Vec<BoundValue>,
}

impl BoundArguments {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    pub fn values(&self) -> &[BoundValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders one declaration line per argument.
    pub fn render(&self, language: &Language) -> String {
        self.values
            .iter()
            .map(|v| language.assignment(&v.name, &language.literal(v.arg_type, &v.value)))
            .collect()
    }
}

/// Checks the number of supplied tokens against the command's declarations.
pub fn check_argument_count(command: &Command, given: usize) -> Result<(), BindingError> {
    let total = command.arguments.len();
    let mandatory = command.mandatory_argument_count();
    if given > total {
        return Err(BindingError::TooManyArguments {
            command: command.name.clone(),
            expected: total,
            given,
        });
    }
    if given < mandatory {
        return Err(BindingError::NotEnoughArguments {
            command: command.name.clone(),
            expected: mandatory,
            given,
        });
    }
    Ok(())
}

/// Validates `tokens` against `command`'s declarations and fills in defaults.
pub fn bind<S: AsRef<str>>(command: &Command, tokens: &[S]) -> Result<BoundArguments, BindingError> {
    check_argument_count(command, tokens.len())?;

    let mut supplied: HashMap<&str, &str> = HashMap::new();
    // Unlabelled values fill the declared arguments that are still unbound, in order.
    let mut free = command.arguments.iter();
    for token in tokens {
        let token = token.as_ref();
        let (label, value) = match token.split_once('=') {
            Some((label, value)) => {
                let label = label.trim();
                if label.is_empty() {
                    return Err(BindingError::MalformedToken(token.to_string()));
                }
                (label, value)
            }
            None => {
                let argument = free
                    .find(|a| !supplied.contains_key(a.name.as_str()))
                    .ok_or_else(|| BindingError::TooManyArguments {
                        command: command.name.clone(),
                        expected: command.arguments.len(),
                        given: tokens.len(),
                    })?;
                (argument.name.as_str(), token)
            }
        };

        let argument = command
            .argument(label)
            .ok_or_else(|| BindingError::UnknownLabel {
                command: command.name.clone(),
                label: label.to_string(),
            })?;

        if supplied.insert(argument.name.as_str(), value).is_some() {
            return Err(BindingError::DuplicateLabel(argument.name.clone()));
        }

        if !argument.arg_type.accepts(value) {
            return Err(BindingError::InvalidArgumentType {
                label: argument.name.clone(),
                value: value.to_string(),
                expected: argument.arg_type,
            });
        }
    }

    let mut values = Vec::with_capacity(command.arguments.len());
    for argument in &command.arguments {
        let (value, source) = match (supplied.get(argument.name.as_str()), &argument.default_value) {
            (Some(value), _) => (value.to_string(), ValueSource::Supplied),
            (None, Some(default)) => (default.clone(), ValueSource::Default),
            (None, None) if argument.optional => (
                argument.arg_type.zero_value().to_string(),
                ValueSource::ZeroValue,
            ),
            (None, None) => {
                return Err(BindingError::MissingArgument {
                    name: argument.name.clone(),
                    arg_type: argument.arg_type,
                });
            }
        };
        values.push(BoundValue {
            name: argument.name.clone(),
            arg_type: argument.arg_type,
            value,
            source,
        });
    }

    Ok(BoundArguments { values })
}
