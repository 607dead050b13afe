//! Copy-on-write view of the project manifest (`composer.json`).
//!
//! Every mutator returns a new document marked dirty and leaves the receiver
//! untouched, so a failed step in a chain of rewrites never corrupts the
//! snapshot the caller still holds. Nothing reaches disk until [`store`].
//!
//! The engine remembers which third-party packages still require an old
//! package under
//!
//! ```json
//! "extra": {
//!     "laminas-migration": {
//!         "nonMigratedPackages": {
//!             "vendor/requirer": { "zendframework/zend-stdlib": "^3.1" }
//!         }
//!     }
//! }
//! ```
//!
//! [`store`]: ManifestDocument::store

use crate::constraint::{is_upgrade, Constraint};
use crate::error::MigrationError;
use crate::package::{Link, Package};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Key under `extra` holding the migration bookkeeping.
pub const MIGRATION_KEY: &str = "laminas-migration";

/// Key under [`MIGRATION_KEY`] mapping requirers to the old packages they
/// still require.
pub const NON_MIGRATED_KEY: &str = "nonMigratedPackages";

const REQUIRE: &str = "require";
const REQUIRE_DEV: &str = "require-dev";

/// Requirer → (old package → constraint).
type NonMigrated = IndexMap<String, IndexMap<String, String>>;

/// Persistent storage for the manifest document.
pub trait ManifestStore {
    fn read(&self) -> Result<Value, MigrationError>;
    fn write(&self, definition: &Value) -> Result<(), MigrationError>;
}

/// A manifest on disk, written the way Composer formats it: four-space
/// indentation and a trailing newline.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> MigrationError {
        MigrationError::ManifestWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl ManifestStore for JsonFile {
    fn read(&self) -> Result<Value, MigrationError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| MigrationError::ManifestRead {
                path: self.path.clone(),
                source,
            })?;

        serde_json::from_str(&content).map_err(|e| {
            MigrationError::ManifestInvalid(format!("{}: {e}", self.path.display()))
        })
    }

    fn write(&self, definition: &Value) -> Result<(), MigrationError> {
        let mut buf = Vec::new();
        {
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            definition
                .serialize(&mut serializer)
                .map_err(|e| self.write_error(e.into()))?;
        }
        buf.push(b'\n');

        // Write next to the target, then rename over it.
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(&buf).map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        debug!(path = %self.path.display(), "manifest written");
        Ok(())
    }
}

/// The requirer whose constraint on an old package is the lowest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledConstraint {
    /// Package that requires the old package.
    pub package: String,
    /// Its constraint on the old package, as written.
    pub constraint: String,
}

impl fmt::Display for ReconciledConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.constraint)
    }
}

/// A snapshot of the manifest.
#[derive(Clone)]
pub struct ManifestDocument {
    definition: Map<String, Value>,
    dirty: bool,
    store: Rc<dyn ManifestStore>,
}

impl fmt::Debug for ManifestDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestDocument")
            .field("definition", &self.definition)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl ManifestDocument {
    /// Load the manifest from `store`. The root must be a JSON object.
    pub fn load(store: Rc<dyn ManifestStore>) -> Result<Self, MigrationError> {
        let Value::Object(definition) = store.read()? else {
            return Err(MigrationError::ManifestInvalid(
                "manifest root must be an object".to_string(),
            ));
        };

        Ok(Self {
            definition,
            dirty: false,
            store,
        })
    }

    /// The in-memory document.
    #[must_use]
    pub fn definition(&self) -> &Map<String, Value> {
        &self.definition
    }

    /// Whether the document differs from what was last loaded or stored.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the root project requires `name` directly.
    #[must_use]
    pub fn is_root_requirement(&self, name: &str) -> bool {
        [REQUIRE, REQUIRE_DEV]
            .iter()
            .any(|key| self.section(key).is_some_and(|s| s.contains_key(name)))
    }

    /// Require `new` in place of `old`.
    ///
    /// The new requirement goes to `require-dev` when `requirer` is itself a
    /// dev requirement of the root, or when `old` is a dev requirement and
    /// `requirer` is not a regular one; otherwise to `require`. The second
    /// case covers the root project as `requirer`, listed in neither section,
    /// replacing its own dev requirement. If `old` sits
    /// in that same section, `new` takes over its position; otherwise `old`
    /// is dropped from wherever it was and `new` is appended. An existing
    /// `new` requirement in the other section moves over.
    pub fn with_requirement_replacement(
        &self,
        old: &str,
        new: &str,
        requirer: &str,
        constraint: &str,
    ) -> Self {
        let in_section =
            |key: &str, name: &str| self.section(key).is_some_and(|s| s.contains_key(name));
        let dev = in_section(REQUIRE_DEV, requirer)
            || (in_section(REQUIRE_DEV, old) && !in_section(REQUIRE, requirer));
        let (target, other) = if dev {
            (REQUIRE_DEV, REQUIRE)
        } else {
            (REQUIRE, REQUIRE_DEV)
        };

        let mut instance = self.modified();
        if let Some(section) = instance.section(other) {
            if section.contains_key(old) || section.contains_key(new) {
                let section = without_keys(section, &[old, new]);
                instance.set_section(other, section);
            }
        }

        let section = instance.section(target).cloned().unwrap_or_default();
        let section = renamed(&section, old, new, Value::String(constraint.to_string()));
        instance.set_section(target, section);
        instance
    }

    /// Rename a root requirement, keeping its section, position and
    /// constraint. Unchanged copy if the root does not require `old`.
    pub fn with_root_requirement_renamed(&self, old: &str, new: &str) -> Self {
        if !self.is_root_requirement(old) {
            return self.clone();
        }

        let mut instance = self.modified();
        for key in [REQUIRE, REQUIRE_DEV] {
            let Some(section) = instance.section(key) else {
                continue;
            };
            let Some(constraint) = section.get(old).cloned() else {
                continue;
            };
            let section = renamed(section, old, new, constraint);
            instance.set_section(key, section);
        }
        instance
    }

    /// Record, for each link, that its source still requires the old target.
    /// Merges into existing entries of the same requirer.
    pub fn remember_non_migrated_packages(&self, links: &[Link]) -> Self {
        let mut instance = self.modified();
        let mut packages = instance.non_migrated();
        for link in links {
            packages
                .entry(link.source.clone())
                .or_default()
                .insert(link.target.clone(), link.constraint.clone());
        }
        instance.set_non_migrated(packages);
        instance
    }

    /// Drop the bookkeeping of `requirer`, e.g. because it is uninstalled.
    pub fn forget_non_migrated_package(&self, requirer: &str) -> Self {
        let mut instance = self.modified();
        let mut packages = instance.non_migrated();
        packages.shift_remove(requirer);
        instance.set_non_migrated(packages);
        instance
    }

    /// Remove the replacements in `old_to_new` from both requirement
    /// sections and scrub the old names from the bookkeeping. Requirers left
    /// without old packages are dropped.
    pub fn without_requirements_for(&self, old_to_new: &IndexMap<String, String>) -> Self {
        if old_to_new.is_empty() {
            return self.clone();
        }

        let mut instance = self.modified();
        let new_names: Vec<&str> = old_to_new.values().map(String::as_str).collect();
        for key in [REQUIRE, REQUIRE_DEV] {
            if let Some(section) = instance.section(key) {
                let section = without_keys(section, &new_names);
                instance.set_section(key, section);
            }
        }

        let mut packages = instance.non_migrated();
        for old in old_to_new.keys() {
            for requirements in packages.values_mut() {
                requirements.shift_remove(old);
            }
        }
        packages.retain(|_, requirements| !requirements.is_empty());
        instance.set_non_migrated(packages);
        instance
    }

    /// Old packages the bookkeeping says `requirer` still requires.
    #[must_use]
    pub fn old_packages_still_required_by(&self, requirer: &str) -> Vec<String> {
        self.non_migrated()
            .get(requirer)
            .map(|requirements| requirements.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any requirer other than `except` still tracks `old`.
    #[must_use]
    pub fn is_old_package_tracked(&self, old: &str, except: &str) -> bool {
        self.non_migrated()
            .iter()
            .any(|(requirer, requirements)| requirer != except && requirements.contains_key(old))
    }

    /// Re-check a tracked requirer against its current requirements: old
    /// packages it no longer requires are dropped, and so is the requirer
    /// once nothing is left. Unchanged copy for untracked packages.
    pub fn update_non_migrated_tracking(&self, package: &Package) -> Self {
        let mut packages = self.non_migrated();
        let Some(requirements) = packages.get_mut(&package.name) else {
            return self.clone();
        };

        let current: Vec<&str> = package.required_names().collect();
        requirements.retain(|old, _| current.contains(&old.as_str()));
        if requirements.is_empty() {
            packages.shift_remove(&package.name);
        }

        let mut instance = self.modified();
        instance.set_non_migrated(packages);
        instance
    }

    /// Among the requirers still tracking `old`, the one with the lowest
    /// constraint lower bound. Ties and constraints without a numeric bound
    /// keep the earliest requirer.
    #[must_use]
    pub fn lowest_reconciled_constraint(&self, old: &str) -> Option<ReconciledConstraint> {
        let mut lowest: Option<(ReconciledConstraint, Option<semver::Version>)> = None;

        for (requirer, mut requirements) in self.non_migrated() {
            let Some(constraint) = requirements.shift_remove(old) else {
                continue;
            };
            let bound = Constraint::parse(&constraint)
                .ok()
                .and_then(|c| c.lower_bound());

            let replace = match &lowest {
                Some((_, lowest_bound)) => !is_upgrade(lowest_bound.as_ref(), bound.as_ref()),
                None => true,
            };
            if replace {
                let candidate = ReconciledConstraint {
                    package: requirer,
                    constraint,
                };
                lowest = Some((candidate, bound));
            }
        }

        lowest.map(|(reconciled, _)| reconciled)
    }

    /// Write the document if it changed: sort when `config.sort-packages` is
    /// on, drop empty bookkeeping, then persist.
    pub fn store(&mut self) -> Result<(), MigrationError> {
        if !self.dirty {
            return Ok(());
        }

        let mut definition = self.definition.clone();
        if sort_packages_enabled(&definition) {
            sort_packages(&mut definition);
        }
        cleanup(&mut definition);

        self.store.write(&Value::Object(definition.clone()))?;
        self.definition = definition;
        self.dirty = false;
        Ok(())
    }

    fn modified(&self) -> Self {
        let mut instance = self.clone();
        instance.dirty = true;
        instance
    }

    fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.definition.get(key).and_then(Value::as_object)
    }

    fn set_section(&mut self, key: &str, section: Map<String, Value>) {
        self.definition
            .insert(key.to_string(), Value::Object(section));
    }

    fn non_migrated(&self) -> NonMigrated {
        let Some(packages) = self
            .definition
            .get("extra")
            .and_then(|extra| extra.get(MIGRATION_KEY))
            .and_then(|migration| migration.get(NON_MIGRATED_KEY))
            .and_then(Value::as_object)
        else {
            return NonMigrated::new();
        };

        packages
            .iter()
            .filter_map(|(requirer, requirements)| {
                let requirements = requirements
                    .as_object()?
                    .iter()
                    .filter_map(|(old, constraint)| {
                        Some((old.clone(), constraint.as_str()?.to_string()))
                    })
                    .collect();
                Some((requirer.clone(), requirements))
            })
            .collect()
    }

    fn set_non_migrated(&mut self, packages: NonMigrated) {
        let mut extra = self
            .definition
            .get("extra")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let exists = extra.contains_key(MIGRATION_KEY);
        if packages.is_empty() && !exists {
            return;
        }

        let value: Map<String, Value> = packages
            .into_iter()
            .map(|(requirer, requirements)| {
                let requirements: Map<String, Value> = requirements
                    .into_iter()
                    .map(|(old, constraint)| (old, Value::String(constraint)))
                    .collect();
                (requirer, Value::Object(requirements))
            })
            .collect();

        let mut migration = extra
            .get(MIGRATION_KEY)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        migration.insert(NON_MIGRATED_KEY.to_string(), Value::Object(value));
        extra.insert(MIGRATION_KEY.to_string(), Value::Object(migration));
        self.definition
            .insert("extra".to_string(), Value::Object(extra));
    }
}

/// Copy of `section` where `new` (with `value`) takes the position of `old`,
/// or is appended when `old` is absent.
fn renamed(section: &Map<String, Value>, old: &str, new: &str, value: Value) -> Map<String, Value> {
    let has_old = section.contains_key(old);
    let mut out = Map::new();
    for (key, existing) in section {
        if key == old {
            out.insert(new.to_string(), value.clone());
        } else if key == new {
            if !has_old {
                out.insert(key.clone(), value.clone());
            }
        } else {
            out.insert(key.clone(), existing.clone());
        }
    }
    if !out.contains_key(new) {
        out.insert(new.to_string(), value);
    }
    out
}

fn without_keys(section: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    section
        .iter()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn sorted(section: &Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<_> = section.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn sort_packages_enabled(root: &Map<String, Value>) -> bool {
    root.get("config")
        .and_then(|config| config.get("sort-packages"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn sort_packages(root: &mut Map<String, Value>) {
    for key in [REQUIRE, REQUIRE_DEV] {
        if let Some(Value::Object(section)) = root.get_mut(key) {
            *section = sorted(section);
        }
    }

    let packages = root
        .get_mut("extra")
        .and_then(|extra| extra.get_mut(MIGRATION_KEY))
        .and_then(|migration| migration.get_mut(NON_MIGRATED_KEY));
    if let Some(Value::Object(packages)) = packages {
        for requirements in packages.values_mut() {
            if let Value::Object(requirements) = requirements {
                *requirements = sorted(requirements);
            }
        }
        *packages = sorted(packages);
    }
}

fn cleanup(root: &mut Map<String, Value>) {
    let Some(Value::Object(extra)) = root.get_mut("extra") else {
        return;
    };

    let has_packages = extra
        .get(MIGRATION_KEY)
        .and_then(|migration| migration.get(NON_MIGRATED_KEY))
        .and_then(Value::as_object)
        .is_some_and(|packages| !packages.is_empty());
    if !has_packages {
        extra.retain(|key, _| key != MIGRATION_KEY);
    }

    if extra.is_empty() {
        root.retain(|key, _| key != "extra");
    }
}
