//! Lifecycle event handling.
//!
//! The host calls one handler per event; handlers either answer right away
//! (rewritten arguments, jobs, pool or operation) or record what they saw
//! for [`Orchestrator::on_post_autoload_dump`], which reconciles the
//! manifest once the host is done installing.

mod reconcile;

use crate::config::{HostGeneration, MigrationConfig};
use crate::error::MigrationError;
use crate::host::{Host, SubCommand};
use crate::manifest::ManifestDocument;
use crate::package::{Operation, Package, PoolEvent, Request};
use crate::rules::{NameRewriteRules, RULES};
use indexmap::IndexMap;
use tracing::{debug, error, info};

/// An old package and the successor to require instead, recorded before
/// installation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingReplacement {
    replacement: String,
    /// Pretty version of the installed old package.
    version: String,
}

/// Coordinates rewrites across one host invocation.
pub struct Orchestrator<H> {
    host: H,
    config: MigrationConfig,
    rules: &'static NameRewriteRules,
    manifest: ManifestDocument,
    /// Old package → successor, in event order.
    pending_replacements: IndexMap<String, PendingReplacement>,
    /// Tracked requirers that are being installed or updated.
    non_migrated_updates: IndexMap<String, Package>,
    /// Tracked requirers being uninstalled → the old packages they required.
    non_migrated_removals: IndexMap<String, Vec<String>>,
    /// Successor → old package, queued for removal.
    replacement_removals: IndexMap<String, String>,
    /// Old packages the host installed although a successor exists.
    old_packages_installed: Vec<Package>,
}

impl<H: Host> Orchestrator<H> {
    #[must_use]
    pub fn new(host: H, config: MigrationConfig, manifest: ManifestDocument) -> Self {
        Self {
            host,
            config,
            rules: &RULES,
            manifest,
            pending_replacements: IndexMap::new(),
            non_migrated_updates: IndexMap::new(),
            non_migrated_removals: IndexMap::new(),
            replacement_removals: IndexMap::new(),
            old_packages_installed: Vec::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn into_host(self) -> H {
        self.host
    }

    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The current manifest snapshot.
    #[must_use]
    pub fn manifest(&self) -> &ManifestDocument {
        &self.manifest
    }

    /// Rewrite the package arguments of a `require` command.
    #[must_use]
    pub fn on_pre_command_run(&self, command: &str, packages: &[String]) -> Vec<String> {
        self.rules.rewrite_command_arguments(command, packages)
    }

    /// Point install and update jobs at successor packages before solving.
    pub fn on_pre_dependencies_solving(&self, request: &mut Request) {
        if self.config.generation != HostGeneration::V1 {
            debug!(
                "Exiting; dependency solving is not rewritten for {}",
                self.config.generation.as_str()
            );
            return;
        }

        for job in &mut request.jobs {
            if job.cmd != "install" && job.cmd != "update" {
                continue;
            }
            let Some(name) = job.package_name.as_deref() else {
                continue;
            };
            if !self.rules.is_rewritable(name) {
                continue;
            }

            let replacement = self.rules.transform(name);
            if replacement == name {
                continue;
            }

            debug!("Replacing package \"{name}\" with package \"{replacement}\"");
            job.package_name = Some(replacement);
        }
    }

    /// Swap old packages in the candidate pool for their successors at the
    /// same version.
    #[must_use]
    pub fn on_pre_pool_create(&self, pool: PoolEvent) -> PoolEvent {
        if self.config.generation != HostGeneration::V2 {
            return pool;
        }

        let any_installed = self
            .host
            .installed()
            .packages()
            .iter()
            .any(|package| self.rules.is_rewritable(&package.name));
        if !any_installed {
            debug!("Exiting; no old packages are installed");
            return pool;
        }

        let PoolEvent {
            packages,
            mut unacceptable_fixed_packages,
        } = pool;

        let mut candidates = Vec::with_capacity(packages.len());
        for package in packages {
            match self.available_replacement(&package) {
                Some(replacement) => {
                    info!("Slipstreaming {} => {}", package.name, replacement.name);
                    unacceptable_fixed_packages.push(package);
                    candidates.push(replacement);
                }
                None => candidates.push(package),
            }
        }

        PoolEvent {
            packages: candidates,
            unacceptable_fixed_packages,
        }
    }

    /// Handle a package about to be installed or updated.
    ///
    /// Returns a replacement operation when the package should be swapped
    /// for its successor; `None` leaves the operation as it is.
    pub fn on_pre_package_install(&mut self, operation: &Operation) -> Option<Operation> {
        let Some(package) = operation.installed_package() else {
            debug!("Exiting; operation of type {} not supported", operation.kind());
            return None;
        };

        match self.config.generation {
            HostGeneration::Legacy => {
                if !self.config.dev_mode {
                    return None;
                }
                self.track_non_migrated_update(package);
                self.record_pending_replacement(package);
                None
            }
            HostGeneration::V1 => {
                self.track_non_migrated_update(package);
                let replacement = self.available_replacement(package)?;
                debug!(
                    "Replacing package {} with package {}, using version {}",
                    package.name, replacement.name, package.version
                );
                Some(operation.with_installed_package(replacement))
            }
            HostGeneration::V2 => {
                let replacement = self.available_replacement(package)?;
                debug!(
                    "Could replace package {} with package {}, using version {}",
                    package.name, replacement.name, package.version
                );
                self.old_packages_installed.push(package.clone());
                None
            }
        }
    }

    /// Handle a package about to be uninstalled.
    pub fn on_pre_package_uninstall(&mut self, operation: &Operation) {
        if self.config.generation == HostGeneration::Legacy && !self.config.dev_mode {
            return;
        }
        let Operation::Uninstall { package } = operation else {
            return;
        };

        let tracked = self.manifest.old_packages_still_required_by(&package.name);
        if !tracked.is_empty() {
            self.non_migrated_removals
                .insert(package.name.clone(), tracked);
            return;
        }

        if let Some(old) = self.rules.old_equivalent_of(package) {
            self.replacement_removals.insert(package.name.clone(), old);
        }
    }

    /// Reconcile the manifest with what happened during the run.
    ///
    /// A failing lock update or removal stops processing and is logged;
    /// manifest changes stored before the failure are kept.
    pub fn on_post_autoload_dump(&mut self) -> Result<(), MigrationError> {
        let result = match self.config.generation {
            HostGeneration::V2 => self.reconcile_installed_old_packages(),
            HostGeneration::Legacy | HostGeneration::V1 => self.reconcile(),
        };

        match result {
            Err(e) if e.is_migration_failure() => {
                error!("{e}");
                Ok(())
            }
            other => other,
        }
    }

    fn track_non_migrated_update(&mut self, package: &Package) {
        if !self
            .manifest
            .old_packages_still_required_by(&package.name)
            .is_empty()
        {
            self.non_migrated_updates
                .insert(package.name.clone(), package.clone());
        }
    }

    fn record_pending_replacement(&mut self, package: &Package) {
        let Some(replacement) = self.rules.replacement_for(package) else {
            debug!(
                "Exiting; package \"{}\" does not have a replacement",
                package.name
            );
            return;
        };

        debug!(
            "Found replacement for package {} ({replacement}), using version {}",
            package.name, package.pretty_version
        );
        self.pending_replacements.insert(
            package.name.clone(),
            PendingReplacement {
                replacement,
                version: package.pretty_version.clone(),
            },
        );
    }

    /// The successor of an old package, at the package's exact version.
    fn available_replacement(&self, package: &Package) -> Option<Package> {
        let name = &package.name;
        if !self.rules.is_rewritable(name) {
            debug!("Exiting; package \"{name}\" does not have a replacement");
            return None;
        }

        let replacement = self.rules.transform(name);
        if replacement == *name {
            debug!("Exiting; while package \"{name}\" is an old package, it does not have a replacement");
            return None;
        }

        let found = self
            .host
            .find_available_package(&replacement, &package.version);
        if found.is_none() {
            debug!(
                "Exiting; no replacement package found for package \"{replacement}\" with version {}",
                package.version
            );
        }
        found
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.config.assume_yes || self.host.confirm(question, true)
    }

    fn run(&mut self, command: &SubCommand) -> Result<i32, MigrationError> {
        debug!("Running {command}");
        self.host.run_command(command)
    }

    fn lock_update(&self) -> SubCommand {
        SubCommand::update(self.config.cwd.clone(), Vec::new())
    }
}
