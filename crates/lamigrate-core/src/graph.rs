//! Installed package graph and dependents queries.
//!
//! A dependents query answers "who requires this package?" and keeps asking
//! the same question for every requirer, producing a tree rooted at the
//! needle. The root project is part of the repository, so a chain ends at
//! the root whenever the project requires something directly.

use crate::constraint::{normalize_version, Constraint};
use crate::package::{Link, Package};
use semver::Version;
use std::collections::HashSet;
use tracing::debug;

/// Maximum depth of a dependents tree.
pub const MAX_DEPENDENTS_DEPTH: usize = 25;

/// A package that requires the queried package, with its own requirers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    /// The requiring package.
    pub package: Package,
    /// The requirement link (`package` → queried package).
    pub link: Link,
    /// Packages requiring `package`, recursively.
    pub children: Vec<Dependent>,
}

/// Read access to installed packages.
pub trait InstalledRepository {
    /// All packages, root project first.
    fn packages(&self) -> &[Package];

    /// First package named `name` whose version satisfies `constraint`.
    fn find_package(&self, name: &str, constraint: &str) -> Option<&Package>;

    /// Dependents tree of `name`. When `version` is given, only links whose
    /// constraint admits that version are followed at the top level.
    fn dependents(&self, name: &str, version: Option<&str>) -> Vec<Dependent>;
}

/// In-memory repository: the root project plus the installed packages.
#[derive(Debug, Clone)]
pub struct InstalledGraph {
    /// Root first; the root's links include its `require-dev`.
    packages: Vec<Package>,
    max_depth: usize,
}

impl InstalledGraph {
    /// Build a graph. `dev_requires` are the root's `require-dev` links and
    /// take part in dependents queries like any other requirement.
    #[must_use]
    pub fn new(mut root: Package, dev_requires: Vec<Link>, installed: Vec<Package>) -> Self {
        root.requires.extend(dev_requires);
        let mut packages = Vec::with_capacity(installed.len() + 1);
        packages.push(root);
        packages.extend(installed);
        Self {
            packages,
            max_depth: MAX_DEPENDENTS_DEPTH,
        }
    }

    /// Override the dependents depth cap.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The root project package.
    #[must_use]
    pub fn root(&self) -> &Package {
        &self.packages[0]
    }

    /// `path` holds the packages on the chain from the queried package down
    /// to `needle`; a requirer already on it is listed without children.
    fn collect_dependents(
        &self,
        needle: &str,
        version: Option<&Version>,
        path: &mut HashSet<String>,
        depth: usize,
    ) -> Vec<Dependent> {
        let mut results = Vec::new();
        for package in &self.packages {
            for link in package.requires.iter().filter(|l| l.target == needle) {
                if let Some(version) = version {
                    if !link_admits(link, version) {
                        continue;
                    }
                }

                let children = if path.contains(&package.name) {
                    Vec::new()
                } else if depth + 1 >= self.max_depth {
                    debug!(package = %package.name, "dependents depth limit reached");
                    Vec::new()
                } else {
                    path.insert(package.name.clone());
                    let children = self.collect_dependents(&package.name, None, path, depth + 1);
                    path.remove(&package.name);
                    children
                };

                results.push(Dependent {
                    package: package.clone(),
                    link: link.clone(),
                    children,
                });
            }
        }

        results
    }
}

impl InstalledRepository for InstalledGraph {
    fn packages(&self) -> &[Package] {
        &self.packages
    }

    fn find_package(&self, name: &str, constraint: &str) -> Option<&Package> {
        let parsed = Constraint::parse(constraint).ok();
        self.packages
            .iter()
            .filter(|p| p.name == name)
            .find(|p| match (&parsed, normalize_version(&p.version)) {
                (Some(c), Some(version)) if !c.is_branch() => c.matches(&version),
                _ => p.version == constraint || p.pretty_version == constraint,
            })
    }

    fn dependents(&self, name: &str, version: Option<&str>) -> Vec<Dependent> {
        let version = version.and_then(normalize_version);
        let mut path = HashSet::from([name.to_string()]);
        self.collect_dependents(name, version.as_ref(), &mut path, 0)
    }
}

/// Unparseable or branch constraints admit everything.
fn link_admits(link: &Link, version: &Version) -> bool {
    match Constraint::parse(&link.constraint) {
        Ok(constraint) if !constraint.is_branch() => constraint.matches(version),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> InstalledGraph {
        let root = Package::new("acme/app", "1.0.0")
            .requiring("zendframework/zend-expressive", "^3.0")
            .requiring("zendframework/zend-stdlib", "^3.2");
        let dev = vec![Link::new("acme/app", "vendor/testing", "^1.0")];
        InstalledGraph::new(
            root,
            dev,
            vec![
                Package::new("zendframework/zend-expressive", "3.2.1")
                    .requiring("zendframework/zend-expressive-router", "^3.0"),
                Package::new("zendframework/zend-expressive-router", "3.1.0")
                    .requiring("zendframework/zend-stdlib", "^3.1"),
                Package::new("zendframework/zend-stdlib", "3.2.1"),
                Package::new("vendor/testing", "1.4.0")
                    .requiring("zendframework/zend-stdlib", "^2.7"),
            ],
        )
    }

    #[test]
    fn test_dependents_tree() {
        let graph = project();
        let dependents = graph.dependents("zendframework/zend-expressive-router", None);

        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].package.name, "zendframework/zend-expressive");
        assert_eq!(dependents[0].children.len(), 1);
        assert_eq!(dependents[0].children[0].package.name, "acme/app");
        assert_eq!(dependents[0].children[0].link.constraint, "^3.0");
    }

    #[test]
    fn test_root_comes_first_and_dev_requires_count() {
        let graph = project();
        let names: Vec<_> = graph
            .dependents("zendframework/zend-stdlib", None)
            .into_iter()
            .map(|d| d.package.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "acme/app",
                "zendframework/zend-expressive-router",
                "vendor/testing"
            ]
        );
        assert_eq!(graph.dependents("vendor/testing", None).len(), 1);
    }

    #[test]
    fn test_version_filters_top_level_links() {
        let graph = project();
        let names: Vec<_> = graph
            .dependents("zendframework/zend-stdlib", Some("3.2.1"))
            .into_iter()
            .map(|d| d.package.name)
            .collect();
        assert_eq!(names, vec!["acme/app", "zendframework/zend-expressive-router"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let root = Package::new("acme/app", "1.0.0").requiring("a/a", "*");
        let graph = InstalledGraph::new(
            root,
            Vec::new(),
            vec![
                Package::new("a/a", "1.0.0").requiring("b/b", "*"),
                Package::new("b/b", "1.0.0").requiring("a/a", "*"),
            ],
        );

        let dependents = graph.dependents("a/a", None);
        assert_eq!(dependents.len(), 2);
        let b = dependents.iter().find(|d| d.package.name == "b/b").unwrap();
        assert_eq!(b.children.len(), 1);
        assert_eq!(b.children[0].package.name, "a/a");
        assert!(b.children[0].children.is_empty());
    }

    #[test]
    fn test_shared_requirer_is_expanded_on_every_path() {
        let root = Package::new("acme/app", "1.0.0").requiring("a/a", "*");
        let graph = InstalledGraph::new(
            root,
            Vec::new(),
            vec![
                Package::new("b/b", "1.0.0").requiring("c/c", "*"),
                Package::new("a/a", "1.0.0")
                    .requiring("b/b", "*")
                    .requiring("c/c", "*"),
                Package::new("c/c", "1.0.0"),
            ],
        );

        let dependents = graph.dependents("c/c", None);
        let names: Vec<_> = dependents.iter().map(|d| d.package.name.as_str()).collect();
        assert_eq!(names, vec!["b/b", "a/a"]);

        // b/b ← a/a ← acme/app
        assert_eq!(dependents[0].children[0].package.name, "a/a");
        assert_eq!(dependents[0].children[0].children[0].package.name, "acme/app");
        // a/a was already walked below b/b; its own requirers still show up.
        assert_eq!(dependents[1].children.len(), 1);
        assert_eq!(dependents[1].children[0].package.name, "acme/app");
    }

    #[test]
    fn test_depth_cap() {
        let mut installed = Vec::new();
        for i in 0..40 {
            installed.push(Package::new(format!("chain/p{i}"), "1.0.0").requiring(
                format!("chain/p{}", i + 1),
                "^1.0",
            ));
        }
        let root = Package::new("acme/app", "1.0.0").requiring("chain/p0", "^1.0");
        let graph = InstalledGraph::new(root, Vec::new(), installed).with_max_depth(5);

        let mut depth = 0;
        let mut level = graph.dependents("chain/p40", None);
        while let Some(first) = level.first() {
            depth += 1;
            level = first.children.clone();
        }
        assert_eq!(depth, 5);
    }

    #[test]
    fn test_find_package() {
        let graph = project();
        let found = graph.find_package("zendframework/zend-stdlib", "^3.1").unwrap();
        assert_eq!(found.version, "3.2.1");
        assert!(graph.find_package("zendframework/zend-stdlib", "^4.0").is_none());
        assert!(graph.find_package("zendframework/zend-stdlib", "3.2.1").is_some());
        assert!(graph.find_package("missing/package", "*").is_none());
    }
}
