//! Why is an old package installed, and where does its replacement belong?
//!
//! For a transitively installed old package the replacement must be required
//! by the root project, at the position of the outermost old package in the
//! chain that pulled it in. Requiring the outermost package's successor also
//! replaces everything below it.

use crate::constraint::locked_constraint;
use crate::error::MigrationError;
use crate::graph::{Dependent, MAX_DEPENDENTS_DEPTH};
use crate::host::Host;
use crate::package::Link;
use crate::rules::{NameRewriteRules, RULES};
use tracing::debug;

/// Where and how an old package's replacement is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationDetails {
    /// Whether the first requirer of the outermost package is a root dev
    /// requirement.
    pub dev: bool,
    /// Outermost old package of the dependency chain.
    pub most_outer_old_package: String,
    /// Constraint for the replacement requirement.
    pub constraint: String,
    /// New names of every old package found in the chain, de-duplicated.
    pub siblings_also_replaced: Vec<String>,
    /// Links requiring the outermost old package, in repository order.
    pub requiring_links: Vec<Link>,
}

impl InstallationDetails {
    /// Source of the first requiring link; decides the manifest section.
    #[must_use]
    pub fn first_requirer(&self) -> &str {
        self.requiring_links
            .first()
            .map_or("", |link| link.source.as_str())
    }
}

/// Dependency-graph queries over the host's installed packages.
pub struct InstallationGraphQuery<'a> {
    host: &'a dyn Host,
    rules: &'a NameRewriteRules,
}

impl<'a> InstallationGraphQuery<'a> {
    #[must_use]
    pub fn new(host: &'a dyn Host) -> Self {
        Self { host, rules: &RULES }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: &'a NameRewriteRules) -> Self {
        self.rules = rules;
        self
    }

    /// Resolve where `old` (installed at `version`) came from.
    ///
    /// In lock mode the constraint pins the installed version of the
    /// outermost package; otherwise it is the constraint its first requirer
    /// declares.
    pub fn resolve(
        &self,
        old: &str,
        version: &str,
        lock: bool,
    ) -> Result<InstallationDetails, MigrationError> {
        let repository = self.host.installed();

        debug!("Searching for {old}");
        let results = repository.dependents(old, Some(version));
        if results.is_empty() {
            return Err(MigrationError::Resolution {
                package: old.to_string(),
            });
        }

        let mut siblings = Vec::new();
        self.collect_replacements(&results, &mut siblings, 0);

        let most_outer = self
            .most_outer_link(&results, 0)
            .map_or_else(|| old.to_string(), |link| link.source.clone());

        debug!(
            "Found the following packages which will be replaced by requiring {most_outer}: {}",
            siblings.join(", ")
        );

        let requiring_links: Vec<Link> = repository
            .dependents(&most_outer, None)
            .into_iter()
            .map(|dependent| dependent.link)
            .collect();
        let Some(first) = requiring_links.first() else {
            return Err(MigrationError::Resolution {
                package: most_outer,
            });
        };

        debug!(
            "Package \"{}\" requires old package \"{most_outer}\" with constraint \"{}\"",
            first.source, first.constraint
        );

        let installed_version = if most_outer == old {
            version.to_string()
        } else {
            repository
                .find_package(&most_outer, &first.constraint)
                .map(|package| package.pretty_version.clone())
                .ok_or_else(|| MigrationError::Resolution {
                    package: most_outer.clone(),
                })?
        };

        let constraint = if lock {
            locked_constraint(&installed_version)
        } else {
            first.constraint.clone()
        };

        Ok(InstallationDetails {
            dev: self.host.is_dev_requirement(&first.source),
            most_outer_old_package: most_outer,
            constraint,
            siblings_also_replaced: siblings,
            requiring_links,
        })
    }

    /// Deepest link whose source is an old package with a successor.
    ///
    /// Walks requirers first; the first qualifying package in repository
    /// order wins, preferring whatever qualifies further out in its chain.
    fn most_outer_link<'r>(&self, results: &'r [Dependent], depth: usize) -> Option<&'r Link> {
        if depth >= MAX_DEPENDENTS_DEPTH {
            return None;
        }

        let mut latest = None;
        for dependent in results {
            latest = self.most_outer_link(&dependent.children, depth + 1);
            if self.rules.replacement_for(&dependent.package).is_none() {
                continue;
            }

            return latest.or(Some(&dependent.link));
        }

        latest
    }

    fn collect_replacements(&self, results: &[Dependent], out: &mut Vec<String>, depth: usize) {
        if depth >= MAX_DEPENDENTS_DEPTH {
            return;
        }

        for dependent in results {
            self.collect_replacements(&dependent.children, out, depth + 1);

            let name = &dependent.package.name;
            if !self.rules.is_rewritable(name) {
                continue;
            }
            let replacement = self.rules.transform(name);
            if replacement != *name && !out.contains(&replacement) {
                out.push(replacement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InstalledGraph;
    use crate::package::Package;
    use crate::test_support::FakeHost;

    /// acme/app → zend-expressive → zend-expressive-router → zend-stdlib,
    /// plus vendor/lib → zend-stdlib.
    fn host() -> FakeHost {
        let root = Package::new("acme/app", "1.0.0")
            .requiring("zendframework/zend-expressive", "^3.0")
            .requiring("vendor/lib", "^1.0");
        FakeHost::new(InstalledGraph::new(
            root,
            Vec::new(),
            vec![
                Package::new("zendframework/zend-expressive", "3.2.1")
                    .with_pretty_version("3.2.1")
                    .requiring("zendframework/zend-expressive-router", "^3.0"),
                Package::new("zendframework/zend-expressive-router", "3.1.0")
                    .requiring("zendframework/zend-stdlib", "^3.1"),
                Package::new("vendor/lib", "1.2.0").requiring("zendframework/zend-stdlib", "^3.2"),
                Package::new("zendframework/zend-stdlib", "3.2.1"),
            ],
        ))
    }

    #[test]
    fn test_most_outer_package_of_chain() {
        let host = host();
        let details = InstallationGraphQuery::new(&host)
            .resolve("zendframework/zend-stdlib", "3.2.1", false)
            .unwrap();

        assert_eq!(details.most_outer_old_package, "zendframework/zend-expressive");
        assert_eq!(details.constraint, "^3.0");
        assert_eq!(details.first_requirer(), "acme/app");
        assert!(!details.dev);
        assert_eq!(
            details.siblings_also_replaced,
            vec!["mezzio/mezzio", "mezzio/mezzio-router"]
        );
    }

    #[test]
    fn test_most_outer_package_through_shared_requirer() {
        // zend-mvc requires zend-stdlib directly and through vendor/lib.
        let root =
            Package::new("acme/app", "1.0.0").requiring("zendframework/zend-expressive", "^3.0");
        let host = FakeHost::new(InstalledGraph::new(
            root,
            Vec::new(),
            vec![
                Package::new("vendor/lib", "1.2.0").requiring("zendframework/zend-stdlib", "^3.1"),
                Package::new("zendframework/zend-mvc", "3.1.1")
                    .requiring("vendor/lib", "^1.0")
                    .requiring("zendframework/zend-stdlib", "^3.2"),
                Package::new("zendframework/zend-expressive", "3.2.1")
                    .requiring("zendframework/zend-mvc", "^3.1"),
                Package::new("zendframework/zend-stdlib", "3.2.1"),
            ],
        ));

        let details = InstallationGraphQuery::new(&host)
            .resolve("zendframework/zend-stdlib", "3.2.1", false)
            .unwrap();

        assert_eq!(details.most_outer_old_package, "zendframework/zend-expressive");
        assert_eq!(details.constraint, "^3.0");
        assert_eq!(
            details.siblings_also_replaced,
            vec!["mezzio/mezzio", "laminas/laminas-mvc"]
        );
    }

    #[test]
    fn test_lock_mode_pins_installed_version_of_most_outer() {
        let host = host();
        let details = InstallationGraphQuery::new(&host)
            .resolve("zendframework/zend-stdlib", "3.2.1", true)
            .unwrap();
        assert_eq!(details.constraint, "~3.2.1.0");
    }

    #[test]
    fn test_direct_requirement_is_its_own_most_outer() {
        let root = Package::new("acme/app", "1.0.0").requiring("zendframework/zend-stdlib", "^3.1");
        let host = FakeHost::new(InstalledGraph::new(
            root,
            Vec::new(),
            vec![Package::new("zendframework/zend-stdlib", "3.2.1")],
        ));

        let details = InstallationGraphQuery::new(&host)
            .resolve("zendframework/zend-stdlib", "3.2.1", true)
            .unwrap();
        assert_eq!(details.most_outer_old_package, "zendframework/zend-stdlib");
        assert_eq!(details.constraint, "~3.2.1.0");
        assert_eq!(
            details.requiring_links,
            vec![Link::new("acme/app", "zendframework/zend-stdlib", "^3.1")]
        );
        assert!(details.siblings_also_replaced.is_empty());
    }

    #[test]
    fn test_dev_follows_first_requirer() {
        let root = Package::new("acme/app", "1.0.0");
        let dev = vec![Link::new("acme/app", "vendor/testing", "^1.0")];
        let host = FakeHost::new(InstalledGraph::new(
            root,
            dev,
            vec![
                Package::new("vendor/testing", "1.0.0").requiring("zendframework/zend-db", "^2.10"),
                Package::new("zendframework/zend-db", "2.11.0"),
            ],
        ))
        .with_dev_requirement("vendor/testing");

        let details = InstallationGraphQuery::new(&host)
            .resolve("zendframework/zend-db", "2.11.0", false)
            .unwrap();
        assert!(details.dev);
        assert_eq!(details.first_requirer(), "vendor/testing");
        assert_eq!(details.constraint, "^2.10");
    }

    #[test]
    fn test_unknown_package_fails_resolution() {
        let host = host();
        let err = InstallationGraphQuery::new(&host)
            .resolve("zendframework/zend-mvc", "3.1.1", false)
            .unwrap_err();
        assert_eq!(err.code(), crate::codes::MIGRATE_RESOLUTION_FAILED);
    }
}
