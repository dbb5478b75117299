// src/core/language.rs

use crate::models::{ArgType, GlobalValue};

/// How string literals are written in a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `'...'`, with embedded quotes written as `'\''` (POSIX shells).
    Single,
    /// `"..."`, with backslash escapes.
    Double,
}

/// Everything needed to assemble and run a script in one interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub interpreter: &'static str,
    /// Arguments always passed to the interpreter, before any flag.
    pub interpreter_args: &'static [&'static str],
    pub shebang: &'static str,
    pub comment: &'static str,
    pub variable_keyword: &'static str,
    pub assignment_operator: &'static str,
    pub line_delimiter: &'static str,
    pub stop_on_error_flag: Option<&'static str>,
    /// Flag that makes the interpreter evaluate its next argument as source.
    pub evaluate_flag: Option<&'static str>,
    /// Pass the script as a file path instead of inline source.
    pub use_temp_file: bool,
    pub file_extension: &'static str,
    pub quote_style: QuoteStyle,
    pub true_literal: &'static str,
    pub false_literal: &'static str,
}

static LANGUAGES: &[Language] = &[
    Language {
        name: "bash",
        interpreter: "/bin/bash",
        interpreter_args: &[],
        shebang: "#!/bin/bash",
        comment: "#",
        variable_keyword: "",
        assignment_operator: "=",
        line_delimiter: "",
        stop_on_error_flag: Some("-e"),
        evaluate_flag: Some("-c"),
        use_temp_file: false,
        file_extension: "sh",
        quote_style: QuoteStyle::Single,
        true_literal: "true",
        false_literal: "false",
    },
    Language {
        name: "python",
        interpreter: "/usr/bin/python3",
        interpreter_args: &[],
        shebang: "#!/usr/bin/env python3",
        comment: "#",
        variable_keyword: "",
        assignment_operator: " = ",
        line_delimiter: "",
        stop_on_error_flag: None,
        evaluate_flag: Some("-c"),
        use_temp_file: false,
        file_extension: "py",
        quote_style: QuoteStyle::Double,
        true_literal: "True",
        false_literal: "False",
    },
    Language {
        name: "ruby",
        interpreter: "/usr/bin/ruby",
        interpreter_args: &[],
        shebang: "#!/usr/bin/env ruby",
        comment: "#",
        variable_keyword: "$",
        assignment_operator: " = ",
        line_delimiter: "",
        stop_on_error_flag: None,
        evaluate_flag: Some("-e"),
        use_temp_file: false,
        file_extension: "rb",
        quote_style: QuoteStyle::Double,
        true_literal: "true",
        false_literal: "false",
    },
    Language {
        name: "javascript",
        interpreter: "osascript",
        interpreter_args: &["-l", "JavaScript"],
        shebang: "#!/usr/bin/env osascript -l JavaScript",
        comment: "//",
        variable_keyword: "var ",
        assignment_operator: " = ",
        line_delimiter: ";",
        stop_on_error_flag: None,
        evaluate_flag: None,
        use_temp_file: true,
        file_extension: "js",
        quote_style: QuoteStyle::Double,
        true_literal: "true",
        false_literal: "false",
    },
];

/// The language used when neither the manifest nor a command names one.
pub const DEFAULT_LANGUAGE: &str = "bash";

pub fn all() -> &'static [Language] {
    LANGUAGES
}

pub fn by_name(name: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.name == name)
}

pub fn by_extension(extension: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.file_extension == extension)
}

impl Language {
    pub fn quote(&self, raw: &str) -> String {
        match self.quote_style {
            QuoteStyle::Single => format!("'{}'", raw.replace('\'', r"'\''")),
            QuoteStyle::Double => {
                format!("\"{}\"", raw.replace('\\', r"\\").replace('"', "\\\""))
            }
        }
    }

    /// Renders `value` as a literal of `arg_type`. Strings are quoted,
    /// numbers stay bare and booleans use the language's own spelling.
    pub fn literal(&self, arg_type: ArgType, value: &str) -> String {
        match arg_type {
            ArgType::String => self.quote(value),
            ArgType::Bool if value == "true" => self.true_literal.to_string(),
            ArgType::Bool => self.false_literal.to_string(),
            ArgType::Int | ArgType::Float => value.to_string(),
        }
    }

    /// One variable declaration line, terminated with a newline.
    pub fn assignment(&self, name: &str, literal: &str) -> String {
        format!(
            "{}{}{}{}{}\n",
            self.variable_keyword, name, self.assignment_operator, literal, self.line_delimiter
        )
    }

    /// Renders a manifest global. Text that reads as a bool or an integer is
    /// emitted bare; everything else is quoted.
    pub fn global_assignment(&self, name: &str, value: &GlobalValue) -> String {
        let literal = match value {
            GlobalValue::Bool(b) => self.literal(ArgType::Bool, &b.to_string()),
            GlobalValue::Int(i) => i.to_string(),
            GlobalValue::Float(x) => x.to_string(),
            GlobalValue::Text(s) if s.parse::<bool>().is_ok() => self.literal(ArgType::Bool, s),
            GlobalValue::Text(s) if s.parse::<i64>().is_ok() => s.clone(),
            GlobalValue::Text(s) => self.quote(s),
        };
        self.assignment(name, &literal)
    }

    /// A line comment in this language.
    pub fn comment_line(&self, text: &str) -> String {
        if text.is_empty() {
            self.comment.to_string()
        } else {
            format!("{} {}", self.comment, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_extension() {
        assert_eq!(by_name("bash").unwrap().file_extension, "sh");
        assert_eq!(by_extension("py").unwrap().name, "python");
        assert!(by_name("cobol").is_none());
        assert!(by_extension("txt").is_none());
    }

    #[test]
    fn test_bash_assignment_quotes_strings() {
        let bash = by_name("bash").unwrap();
        assert_eq!(bash.assignment("name", &bash.literal(ArgType::String, "it's")), "name='it'\\''s'\n");
        assert_eq!(bash.assignment("count", &bash.literal(ArgType::Int, "4")), "count=4\n");
    }

    #[test]
    fn test_python_assignment_and_booleans() {
        let python = by_name("python").unwrap();
        assert_eq!(python.assignment("retries", "3"), "retries = 3\n");
        assert_eq!(python.literal(ArgType::Bool, "true"), "True");
        assert_eq!(python.literal(ArgType::String, "say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_javascript_uses_keyword_and_delimiter() {
        let js = by_name("javascript").unwrap();
        assert_eq!(js.assignment("x", "1"), "var x = 1;\n");
    }

    #[test]
    fn test_global_assignment_bare_for_bools_and_ints() {
        let bash = by_name("bash").unwrap();
        assert_eq!(
            bash.global_assignment("DEBUG", &GlobalValue::Text("true".into())),
            "DEBUG=true\n"
        );
        assert_eq!(
            bash.global_assignment("PORT", &GlobalValue::Text("8080".into())),
            "PORT=8080\n"
        );
        assert_eq!(
            bash.global_assignment("NAME", &GlobalValue::Text("my app".into())),
            "NAME='my app'\n"
        );
        assert_eq!(bash.global_assignment("N", &GlobalValue::Int(2)), "N=2\n");
    }
}
