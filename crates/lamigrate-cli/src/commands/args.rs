//! `lamigrate args` command implementation.
//!
//! Shows what the pre-command hook does to `composer require` arguments.

use lamigrate_core::RULES;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

#[derive(Serialize)]
struct ArgsResult {
    ok: bool,
    command: String,
    arguments: Vec<String>,
    changed: bool,
}

pub fn run(command: &str, packages: &[String], json: bool) -> Result<()> {
    let arguments = RULES.rewrite_command_arguments(command, packages);
    let changed = arguments.as_slice() != packages;

    if json {
        let result = ArgsResult {
            ok: true,
            command: command.to_string(),
            arguments,
            changed,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
        return Ok(());
    }

    println!("{command} {}", arguments.join(" "));
    Ok(())
}
