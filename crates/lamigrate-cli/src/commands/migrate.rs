//! `lamigrate migrate` command implementation.
//!
//! Replays a host session against the project on disk: every installed
//! package goes through the pre-package-install hook, then the manifest is
//! reconciled as after an autoload dump.

use crate::project::ComposerProject;
use lamigrate_core::{
    JsonFile, ManifestDocument, ManifestStore, MigrationConfig, MigrationError, Operation,
    Orchestrator,
};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::rc::Rc;
use tracing::info;

#[derive(Serialize)]
struct MigrateResult {
    ok: bool,
    cwd: String,
    generation: String,
    /// Operations the hook swapped for a successor (v1 hosts).
    swapped: Vec<SwapJson>,
    /// Follow-up package manager runs, in order.
    commands: Vec<String>,
    uninstalled: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MigrateErrorJson>,
}

#[derive(Serialize)]
struct SwapJson {
    from: String,
    to: String,
    version: String,
}

#[derive(Serialize)]
struct MigrateErrorJson {
    code: String,
    message: String,
}

pub fn run(config: MigrationConfig, composer: &str, json: bool) -> Result<()> {
    let mut result = MigrateResult {
        ok: true,
        cwd: config.cwd.display().to_string(),
        generation: config.generation.as_str().to_string(),
        swapped: Vec::new(),
        commands: Vec::new(),
        uninstalled: Vec::new(),
        error: None,
    };

    if let Err(e) = migrate(config, composer, &mut result) {
        if !json {
            return Err(e).into_diagnostic();
        }
        result.ok = false;
        result.error = Some(MigrateErrorJson {
            code: e.code().to_string(),
            message: e.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
        std::process::exit(1);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        for swap in &result.swapped {
            println!("{} -> {} ({})", swap.from, swap.to, swap.version);
        }
        for command in &result.commands {
            println!("ran: {command}");
        }
        for package in &result.uninstalled {
            println!("uninstalled: {package}");
        }
    }
    Ok(())
}

fn migrate(
    config: MigrationConfig,
    composer: &str,
    result: &mut MigrateResult,
) -> Result<(), MigrationError> {
    let project = ComposerProject::load(&config, composer)?;
    let store: Rc<dyn ManifestStore> = Rc::new(JsonFile::new(&config.manifest_path));
    let manifest = ManifestDocument::load(store)?;
    let packages = project.installed_packages();

    info!(
        "Checking {} installed packages ({} host)",
        packages.len(),
        config.generation.as_str()
    );
    let mut orchestrator = Orchestrator::new(project, config, manifest);
    for package in packages {
        let operation = Operation::Install { package };
        let Some(swapped) = orchestrator.on_pre_package_install(&operation) else {
            continue;
        };
        if let (Some(from), Some(to)) = (operation.installed_package(), swapped.installed_package()) {
            result.swapped.push(SwapJson {
                from: from.name.clone(),
                to: to.name.clone(),
                version: to.pretty_version.clone(),
            });
        }
    }

    let outcome = orchestrator.on_post_autoload_dump();
    let project = orchestrator.into_host();
    result.commands = project.executed().to_vec();
    result.uninstalled = project.uninstalled().to_vec();
    outcome
}
