//! Post-autoload-dump reconciliation.

use super::{Orchestrator, PendingReplacement};
use crate::error::MigrationError;
use crate::host::{Host, SubCommand};
use crate::installation::InstallationGraphQuery;
use crate::manifest::ManifestDocument;
use crate::package::{Link, Package};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::mem;
use tracing::{debug, info, warn};

impl<H: Host> Orchestrator<H> {
    /// Legacy and v1 hosts: replacements, then updated requirers, then
    /// uninstalled requirers.
    pub(super) fn reconcile(&mut self) -> Result<(), MigrationError> {
        let pending = mem::take(&mut self.pending_replacements);
        self.handle_replacements(&pending)?;

        let updates = mem::take(&mut self.non_migrated_updates);
        self.handle_non_migrated_updates(&updates)?;

        let removals = mem::take(&mut self.non_migrated_removals);
        self.handle_uninstallations(removals)?;

        self.manifest.store()
    }

    /// V2 hosts: old packages that slipped through are required by their
    /// successor name when the root requires them, then uninstalled.
    pub(super) fn reconcile_installed_old_packages(&mut self) -> Result<(), MigrationError> {
        if self.old_packages_installed.is_empty() {
            debug!("Exiting; no old packages were installed");
            return Ok(());
        }

        let installed = mem::take(&mut self.old_packages_installed);
        for package in &installed {
            if !self.manifest.is_root_requirement(&package.name) {
                continue;
            }

            let replacement = self.rules.transform(&package.name);
            info!(
                "Package {} is a root requirement. Changing composer.json to require {replacement} directly!",
                package.name
            );
            self.manifest = self
                .manifest
                .with_root_requirement_renamed(&package.name, &replacement);
        }

        for package in &installed {
            self.host.uninstall(package)?;
        }

        self.manifest.store()?;

        info!("Updating `composer.lock` to synchronize with `composer.json`...");
        let command = self
            .lock_update()
            .with_options(&self.config.lock_update_options);
        if self.run(&command)? != 0 {
            return Err(MigrationError::LockUpdateFailed);
        }
        Ok(())
    }

    fn handle_replacements(
        &mut self,
        pending: &IndexMap<String, PendingReplacement>,
    ) -> Result<(), MigrationError> {
        if pending.is_empty() {
            return Ok(());
        }

        info!(
            "Found {} zend packages which can be replaced with laminas packages.",
            pending.len()
        );
        if !self.confirm("Do you want to proceed? (Y/n) ") {
            return Ok(());
        }

        info!("Replacing zend packages with laminas packages in `composer.json`...");
        self.manifest = self.replace_in_definition(pending, true)?;
        self.manifest.store()?;

        info!("Updating `composer.lock` to remove zend packages and install laminas pendants...");
        let packages = pending
            .keys()
            .cloned()
            .chain(pending.values().map(|p| p.replacement.clone()))
            .collect();
        let command = SubCommand::update(self.config.cwd.clone(), packages);
        if self.run(&command)? != 0 {
            return Err(MigrationError::LockUpdateFailed);
        }

        info!("Updating `composer.json` to restore constraints from third-party packages...");
        self.manifest = self.replace_in_definition(pending, false)?;
        self.manifest.store()?;

        info!("Updating `composer.lock` to synchronize with `composer.json`...");
        let command = self.lock_update();
        if self.run(&command)? != 0 {
            return Err(MigrationError::LockUpdateFailed);
        }

        Ok(())
    }

    /// Require successors at the position of the outermost old package of
    /// each chain, pinned to installed versions in lock mode.
    fn replace_in_definition(
        &self,
        pending: &IndexMap<String, PendingReplacement>,
        lock: bool,
    ) -> Result<ManifestDocument, MigrationError> {
        let old_by_replacement: HashMap<&str, &str> = pending
            .iter()
            .map(|(old, p)| (p.replacement.as_str(), old.as_str()))
            .collect();
        let root = self
            .host
            .installed()
            .packages()
            .first()
            .map(|package| package.name.clone())
            .unwrap_or_default();

        let query = InstallationGraphQuery::new(&self.host).with_rules(self.rules);
        let mut replaced: HashSet<String> = HashSet::new();
        let mut manifest = self.manifest.clone();

        for (old, p) in pending {
            if replaced.contains(old) {
                continue;
            }

            let details = query.resolve(old, &p.version, lock)?;
            let most_outer = &details.most_outer_old_package;
            let replacement = pending
                .get(most_outer)
                .map_or_else(|| self.rules.transform(most_outer), |m| m.replacement.clone());

            manifest = manifest.with_requirement_replacement(
                most_outer,
                &replacement,
                details.first_requirer(),
                &details.constraint,
            );
            if most_outer != old && manifest.is_root_requirement(old) {
                manifest = manifest.with_root_requirement_renamed(old, &p.replacement);
            }

            replaced.insert(most_outer.clone());
            for sibling in &details.siblings_also_replaced {
                if let Some(sibling_old) = old_by_replacement.get(sibling.as_str()) {
                    replaced.insert((*sibling_old).to_string());
                }
            }

            if !lock {
                info!("Adding \"{replacement}\" to `composer.json` dependencies to replace \"{most_outer}\"");
            }

            let third_party: Vec<Link> = details
                .requiring_links
                .iter()
                .filter(|link| link.source != root)
                .cloned()
                .collect();
            manifest = manifest.remember_non_migrated_packages(&third_party);
        }

        Ok(manifest)
    }

    /// Requirers that were updated may no longer need some old packages;
    /// their successors either move to the next requirer's constraint or
    /// become removal candidates.
    fn handle_non_migrated_updates(
        &mut self,
        updates: &IndexMap<String, Package>,
    ) -> Result<(), MigrationError> {
        if updates.is_empty() {
            return Ok(());
        }

        for (name, package) in updates {
            let tracked = self.manifest.old_packages_still_required_by(name);
            self.manifest = self.manifest.update_non_migrated_tracking(package);

            let still_required: Vec<&str> = package
                .required_names()
                .filter(|required| self.rules.is_old_package(required))
                .collect();

            for old in tracked
                .iter()
                .filter(|old| !still_required.contains(&old.as_str()))
            {
                let replacement = self.rules.transform(old);
                match self.manifest.lowest_reconciled_constraint(old) {
                    Some(next) => {
                        debug!("Requiring {replacement} with {next} instead");
                        self.manifest = self.manifest.with_requirement_replacement(
                            old,
                            &replacement,
                            &next.package,
                            &next.constraint,
                        );
                    }
                    None => {
                        if self.confirm_removal(&replacement, name) {
                            self.replacement_removals
                                .insert(replacement, old.clone());
                        }
                    }
                }
            }
        }

        self.manifest.store()
    }

    /// Successors no longer required by anyone are removed through the host,
    /// after confirmation.
    fn handle_uninstallations(
        &mut self,
        removals: IndexMap<String, Vec<String>>,
    ) -> Result<(), MigrationError> {
        let mut to_remove: IndexMap<String, String> = mem::take(&mut self.replacement_removals)
            .into_iter()
            .map(|(new, old)| (old, new))
            .collect();

        for (package, olds) in removals {
            self.manifest = self.manifest.forget_non_migrated_package(&package);
            for old in olds {
                let replacement = self.rules.transform(&old);
                if to_remove.values().any(|queued| *queued == replacement) {
                    continue;
                }
                if self.manifest.is_old_package_tracked(&old, &package) {
                    debug!("Keeping {replacement}; {old} is still required by another package");
                    continue;
                }
                if !self.confirm_removal(&replacement, &package) {
                    continue;
                }
                to_remove.insert(old, replacement);
            }
        }

        if to_remove.is_empty() {
            return self.manifest.store();
        }

        let names: Vec<String> = to_remove.values().cloned().collect();
        debug!(
            "Removing the following packages from composer.json: {}",
            names.join(", ")
        );
        let command = SubCommand::remove(self.config.cwd.clone(), names.clone());
        if self.run(&command)? != 0 {
            return Err(MigrationError::PackageRemovalFailed { packages: names });
        }

        self.manifest = self.manifest.without_requirements_for(&to_remove);
        self.manifest.store()?;

        info!("Updating `composer.lock` to synchronize with `composer.json`...");
        let command = self.lock_update();
        let exit_code = self.run(&command)?;
        if exit_code != 0 {
            warn!("`{command}` exited with code {exit_code}");
        }
        Ok(())
    }

    fn confirm_removal(&mut self, replacement: &str, dependant: &str) -> bool {
        info!(
            "Laminas migration added package {replacement} which can (probably) be removed due \
             to uninstallation or update of the package {dependant}."
        );
        warn!(
            "WARNING! Please verify, that you are not using the laminas dependency in your \
             project directly. If the package is removed, your code may break."
        );
        self.confirm(&format!(
            "Do you want to remove {replacement} from your dependencies? You will not be \
             prompted again! (Y/n)"
        ))
    }
}
