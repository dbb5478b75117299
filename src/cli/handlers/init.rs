// src/cli/handlers/init.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::{
    cli::AppContext,
    constants::{CONFIG_FILENAME, GLOBALS_FILE_STEM, HEADER_NAMESPACE, STOKE_DIR},
    core::{
        config_loader,
        language::{self, Language},
    },
    models::{Config, GlobalValue},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Creates a stoke/ directory with a configuration, globals and a sample command."
)]
struct InitArgs {
    /// Skip the confirmation prompt.
    #[arg(long, short)]
    yes: bool,

    /// Language of the generated globals and sample scripts.
    #[arg(long, short, default_value = language::DEFAULT_LANGUAGE)]
    language: String,
}

pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<()> {
    let init_args = InitArgs::try_parse_from(&args)?;
    let language = language::by_name(&init_args.language).ok_or_else(|| {
        let known: Vec<&str> = language::all().iter().map(|l| l.name).collect();
        anyhow!(
            "Unknown language '{}'. Known languages: {}",
            init_args.language,
            known.join(", ")
        )
    })?;

    let stoke_dir = ctx.cwd.join(STOKE_DIR);
    if stoke_dir.exists() {
        return Err(anyhow!(
            "A '{}' directory already exists at this location.",
            STOKE_DIR
        ));
    }

    if !init_args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Create '{}' in {}?", STOKE_DIR, ctx.cwd.display()))
            .default(true)
            .interact()?;
        if ctx.token.load(Ordering::SeqCst) {
            return Err(anyhow!("Operation cancelled."));
        }
        if !confirmed {
            println!("{}", "Nothing was created.".yellow());
            return Ok(());
        }
    }

    let created = scaffold(&stoke_dir, language)?;

    println!("\n{}", "Success!".green().bold());
    for path in created {
        println!("  {} {}", "→".blue(), path.display());
    }
    println!("  Run 'stoke hello' to try it.");
    Ok(())
}

/// Writes the configuration, the globals script and a sample command.
fn scaffold(stoke_dir: &Path, language: &Language) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(stoke_dir)
        .with_context(|| format!("Could not create '{}'", stoke_dir.display()))?;

    let files = [
        (
            stoke_dir.join(CONFIG_FILENAME),
            config_loader::to_toml(&Config::default())?,
        ),
        (
            stoke_dir.join(format!("{}.{}", GLOBALS_FILE_STEM, language.file_extension)),
            globals_script(language),
        ),
        (
            stoke_dir.join(format!("hello.{}", language.file_extension)),
            hello_script(language),
        ),
    ];

    let mut created = Vec::new();
    for (path, content) in files {
        fs::write(&path, content)
            .with_context(|| format!("Could not write '{}'", path.display()))?;
        created.push(path);
    }
    Ok(created)
}

fn globals_script(language: &Language) -> String {
    [
        language.shebang.to_string(),
        language.comment_line("Variables defined here are visible to every command."),
        language.global_assignment("GREETING", &GlobalValue::Text("Hello".to_string())),
        String::new(),
    ]
    .join("\n")
}

fn hello_script(language: &Language) -> String {
    let separator = language.comment_line(&"-".repeat(40));
    let field = |name: &str, value: &str| {
        language.comment_line(&format!("@{}-{}: {}", HEADER_NAMESPACE, name, value))
    };
    let body = match language.name {
        "bash" => "echo \"$GREETING, $name!\"",
        "python" => "print(f\"{GREETING}, {name}!\")",
        "ruby" => "puts \"#{$GREETING}, #{$name}!\"",
        "javascript" => "console.log(`${GREETING}, ${name}!`);",
        _ => "",
    };
    [
        language.shebang.to_string(),
        separator.clone(),
        field("help", "print a greeting"),
        field("args", "name:String?=world"),
        separator.clone(),
        language.comment_line("Usage: stoke hello name=you"),
        separator,
        String::new(),
        body.to_string(),
        String::new(),
    ]
    .join("\n")
}
