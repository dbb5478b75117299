// src/core/sanitize.rs

use crate::{
    constants::HEADER_NAMESPACE,
    core::{
        header_parser::{self, HeaderLine},
        language::Language,
    },
};

/// Rewrites a script so its header parses: the shebang is inserted (or a
/// foreign one replaced) and malformed field markers are written in their
/// canonical `<comment> @stoke-<field>: <value>` form. Lines after the header
/// are left untouched.
pub fn sanitize(content: &str, language: &Language) -> String {
    let mut lines: Vec<String> = vec![language.shebang.to_string()];
    let mut body = content.lines();

    match content.lines().next() {
        Some(first) if first.trim_end() == language.shebang => {
            body.next();
        }
        Some(first) if first.starts_with("#!") => {
            log::debug!("Replacing shebang '{}' with '{}'", first, language.shebang);
            body.next();
        }
        _ => log::debug!("Inserting shebang '{}'", language.shebang),
    }

    let mut in_header = true;
    for line in body {
        if !in_header {
            lines.push(line.to_string());
            continue;
        }
        match header_parser::classify(line, language) {
            HeaderLine::Malformed { name, value } => {
                let fixed = canonical_field(language, name, value);
                log::debug!("Rewriting header line '{}' as '{}'", line, fixed);
                lines.push(fixed);
            }
            HeaderLine::End => {
                in_header = false;
                lines.push(line.to_string());
            }
            _ => lines.push(line.to_string()),
        }
    }

    let mut sanitized = lines.join("\n");
    if content.ends_with('\n') {
        sanitized.push('\n');
    }
    sanitized
}

/// Formats a header field the way the strict pattern expects it.
pub fn canonical_field(language: &Language, name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{} @{}-{}", language.comment, HEADER_NAMESPACE, name)
    } else {
        format!("{} @{}-{}: {}", language.comment, HEADER_NAMESPACE, name, value)
    }
}
