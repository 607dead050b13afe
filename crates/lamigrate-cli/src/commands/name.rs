//! `lamigrate name` command implementation.

use lamigrate_core::RULES;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

#[derive(Serialize)]
struct NameResult {
    ok: bool,
    packages: Vec<NameJson>,
}

#[derive(Serialize)]
struct NameJson {
    name: String,
    /// `None` when the package has no successor.
    replacement: Option<String>,
    ignored: bool,
}

/// Print the successor of each package.
pub fn run(packages: &[String], json: bool) -> Result<()> {
    let entries: Vec<NameJson> = packages
        .iter()
        .map(|name| {
            let replacement = RULES.transform(name);
            NameJson {
                replacement: (replacement != *name).then_some(replacement),
                ignored: RULES.is_ignored(name),
                name: name.clone(),
            }
        })
        .collect();

    if json {
        let result = NameResult {
            ok: true,
            packages: entries,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
        return Ok(());
    }

    for entry in &entries {
        match &entry.replacement {
            Some(replacement) => println!("{} -> {replacement}", entry.name),
            None => println!("{} (unchanged)", entry.name),
        }
    }
    Ok(())
}
