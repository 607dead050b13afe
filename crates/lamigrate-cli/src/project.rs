//! A Composer project directory acting as the migration host.
//!
//! The installed repository comes from `composer.json` (root package) and
//! `vendor/composer/installed.json`; follow-up runs shell out to the
//! `composer` executable.

use lamigrate_core::{
    Host, InstalledGraph, InstalledRepository, JsonFile, Link, ManifestStore, MigrationConfig,
    MigrationError, Package, SubCommand,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Name Composer gives a root package without a `name`.
const ROOT_PACKAGE_NAME: &str = "__root__";

/// `installed.json`: an object with `packages` (Composer 2) or a bare
/// array (Composer 1).
#[derive(Deserialize)]
#[serde(untagged)]
enum InstalledFile {
    V2 { packages: Vec<InstalledEntry> },
    V1(Vec<InstalledEntry>),
}

#[derive(Deserialize)]
struct InstalledEntry {
    name: String,
    version: String,
    #[serde(default)]
    version_normalized: Option<String>,
    #[serde(default)]
    require: Map<String, Value>,
    #[serde(default)]
    replace: Map<String, Value>,
    /// `true`, or the name of the successor package.
    #[serde(default)]
    abandoned: Option<Value>,
}

impl InstalledEntry {
    fn into_package(self) -> Package {
        let mut package = Package::new(
            self.name.clone(),
            self.version_normalized.unwrap_or_else(|| self.version.clone()),
        )
        .with_pretty_version(self.version);
        package.requires = links(&self.name, &self.require);
        package.replaces = links(&self.name, &self.replace);
        package.replacement = self
            .abandoned
            .and_then(|abandoned| abandoned.as_str().map(str::to_string));
        package
    }
}

fn links(source: &str, section: &Map<String, Value>) -> Vec<Link> {
    section
        .iter()
        .filter_map(|(target, constraint)| Some(Link::new(source, target, constraint.as_str()?)))
        .collect()
}

/// The host over a project on disk.
pub struct ComposerProject {
    vendor_dir: PathBuf,
    composer: String,
    /// Show the output of follow-up runs.
    verbose: bool,
    graph: InstalledGraph,
    dev_requirements: Vec<String>,
    executed: Vec<String>,
    uninstalled: Vec<String>,
}

impl ComposerProject {
    /// Read the project described by `config`.
    ///
    /// A missing `installed.json` means nothing is installed yet.
    pub fn load(config: &MigrationConfig, composer: &str) -> Result<Self, MigrationError> {
        let manifest = JsonFile::new(&config.manifest_path).read()?;
        let empty = Map::new();
        let section = |key: &str| manifest.get(key).and_then(Value::as_object).unwrap_or(&empty);

        let name = manifest
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(ROOT_PACKAGE_NAME)
            .to_string();
        let version = manifest
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("1.0.0");
        let mut root = Package::new(name.clone(), version);
        root.requires = links(&name, section("require"));
        let dev_links = links(&name, section("require-dev"));
        let dev_requirements = dev_links.iter().map(|link| link.target.clone()).collect();

        let installed = read_installed(&config.vendor_dir)?;
        debug!(count = installed.len(), "installed packages loaded");

        Ok(Self {
            vendor_dir: config.vendor_dir.clone(),
            composer: composer.to_string(),
            verbose: config.verbosity > 0,
            graph: InstalledGraph::new(root, dev_links, installed),
            dev_requirements,
            executed: Vec::new(),
            uninstalled: Vec::new(),
        })
    }

    /// Installed packages, without the root project.
    #[must_use]
    pub fn installed_packages(&self) -> Vec<Package> {
        self.graph.packages().iter().skip(1).cloned().collect()
    }

    /// Command lines run so far.
    #[must_use]
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Packages removed from the vendor directory so far.
    #[must_use]
    pub fn uninstalled(&self) -> &[String] {
        &self.uninstalled
    }
}

fn read_installed(vendor_dir: &Path) -> Result<Vec<Package>, MigrationError> {
    let path = vendor_dir.join("composer").join("installed.json");
    if !path.exists() {
        debug!(path = %path.display(), "no installed.json");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|source| MigrationError::ManifestRead { path: path.clone(), source })?;
    let file: InstalledFile = serde_json::from_str(&content)
        .map_err(|e| MigrationError::ManifestInvalid(format!("{}: {e}", path.display())))?;

    let entries = match file {
        InstalledFile::V2 { packages } | InstalledFile::V1(packages) => packages,
    };
    Ok(entries.into_iter().map(InstalledEntry::into_package).collect())
}

impl Host for ComposerProject {
    fn installed(&self) -> &dyn InstalledRepository {
        &self.graph
    }

    fn is_dev_requirement(&self, name: &str) -> bool {
        self.dev_requirements.iter().any(|n| n == name)
    }

    /// Only packages already present in the vendor directory are known.
    fn find_available_package(&self, name: &str, version: &str) -> Option<Package> {
        self.graph
            .packages()
            .iter()
            .find(|p| p.name == name && p.version == version)
            .cloned()
    }

    fn run_command(&mut self, command: &SubCommand) -> Result<i32, MigrationError> {
        let line = format!("{} {command}", self.composer);
        info!("Running {line}");
        // Keep stdout for our own results.
        let (stdout, stderr) = if self.verbose {
            (Stdio::from(io::stderr()), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };
        let status = Command::new(&self.composer)
            .args(command.to_args())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|e| MigrationError::CommandFailed {
                command: line.clone(),
                reason: e.to_string(),
            })?;
        self.executed.push(line);

        // Killed by a signal.
        Ok(status.code().unwrap_or(1))
    }

    fn uninstall(&mut self, package: &Package) -> Result<(), MigrationError> {
        let dir = self.vendor_dir.join(&package.name);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir).map_err(|e| MigrationError::CommandFailed {
                command: format!("uninstall {}", package.name),
                reason: e.to_string(),
            })?;
        }
        debug!(package = %package.name, "uninstalled");
        self.uninstalled.push(package.name.clone());
        Ok(())
    }

    fn confirm(&mut self, question: &str, default: bool) -> bool {
        eprint!("{question} ");
        if io::stderr().flush().is_err() {
            return default;
        }

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input).is_err() {
            return default;
        }
        match input.trim().to_ascii_lowercase().as_str() {
            "" => default,
            answer => answer.starts_with('y'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_reads_root_and_installed_packages() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "composer.json",
            r#"{
                "name": "acme/app",
                "require": { "zendframework/zend-mvc": "^3.1" },
                "require-dev": { "zendframework/zend-test": "^3.2" }
            }"#,
        );
        write(
            tmp.path(),
            "vendor/composer/installed.json",
            r#"{ "packages": [
                {
                    "name": "zendframework/zend-mvc",
                    "version": "3.1.1",
                    "version_normalized": "3.1.1.0",
                    "require": { "zendframework/zend-stdlib": "^3.1" },
                    "abandoned": "laminas/laminas-mvc"
                },
                { "name": "zendframework/zend-stdlib", "version": "3.2.1" }
            ] }"#,
        );

        let config = MigrationConfig::new(tmp.path().to_path_buf());
        let project = ComposerProject::load(&config, "composer").unwrap();

        let root = &project.graph.packages()[0];
        assert_eq!(root.name, "acme/app");
        assert_eq!(root.requires.len(), 2);
        assert!(project.is_dev_requirement("zendframework/zend-test"));
        assert!(!project.is_dev_requirement("zendframework/zend-mvc"));

        let installed = project.installed_packages();
        assert_eq!(installed.len(), 2);
        assert_eq!(installed[0].version, "3.1.1.0");
        assert_eq!(installed[0].pretty_version, "3.1.1");
        assert_eq!(installed[0].replacement.as_deref(), Some("laminas/laminas-mvc"));
        assert_eq!(installed[1].version, "3.2.1");

        let dependents = project.installed().dependents("zendframework/zend-stdlib", None);
        assert_eq!(dependents[0].package.name, "zendframework/zend-mvc");
        assert_eq!(dependents[0].children[0].package.name, "acme/app");
    }

    #[test]
    fn test_load_accepts_composer_1_installed_format() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "composer.json", "{}");
        write(
            tmp.path(),
            "vendor/composer/installed.json",
            r#"[{ "name": "zendframework/zend-stdlib", "version": "3.2.1", "abandoned": true }]"#,
        );

        let config = MigrationConfig::new(tmp.path().to_path_buf());
        let project = ComposerProject::load(&config, "composer").unwrap();

        assert_eq!(project.graph.packages()[0].name, ROOT_PACKAGE_NAME);
        let installed = project.installed_packages();
        assert_eq!(installed[0].name, "zendframework/zend-stdlib");
        assert!(installed[0].replacement.is_none());
    }

    #[test]
    fn test_missing_installed_json_is_empty() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "composer.json", r#"{"name": "acme/app"}"#);

        let config = MigrationConfig::new(tmp.path().to_path_buf());
        let project = ComposerProject::load(&config, "composer").unwrap();
        assert!(project.installed_packages().is_empty());
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let config = MigrationConfig::new(tmp.path().to_path_buf());
        let err = ComposerProject::load(&config, "composer").err().unwrap();
        assert_eq!(err.code(), lamigrate_core::codes::MIGRATE_MANIFEST_READ);
    }

    #[test]
    fn test_uninstall_removes_vendor_directory() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "composer.json", "{}");
        write(tmp.path(), "vendor/zendframework/zend-stdlib/composer.json", "{}");

        let config = MigrationConfig::new(tmp.path().to_path_buf());
        let mut project = ComposerProject::load(&config, "composer").unwrap();
        project
            .uninstall(&Package::new("zendframework/zend-stdlib", "3.2.1"))
            .unwrap();

        assert!(!tmp.path().join("vendor/zendframework/zend-stdlib").exists());
        assert_eq!(project.uninstalled(), ["zendframework/zend-stdlib"]);
    }

    #[test]
    fn test_follow_up_output_only_shown_when_verbose() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "composer.json", "{}");

        let quiet = MigrationConfig::new(tmp.path().to_path_buf());
        assert!(!ComposerProject::load(&quiet, "composer").unwrap().verbose);

        let verbose = MigrationConfig::new(tmp.path().to_path_buf()).with_verbosity(1);
        assert!(ComposerProject::load(&verbose, "composer").unwrap().verbose);
    }

    #[cfg(unix)]
    #[test]
    fn test_quiet_run_still_reports_exit_code() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "composer.json", "{}");
        let config = MigrationConfig::new(tmp.path().to_path_buf());

        let mut project = ComposerProject::load(&config, "true").unwrap();
        let code = project
            .run_command(&SubCommand::update(tmp.path(), Vec::new()))
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(project.executed().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_reports_exit_code() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "composer.json", "{}");
        let config = MigrationConfig::new(tmp.path().to_path_buf());

        let mut project = ComposerProject::load(&config, "false").unwrap();
        let code = project
            .run_command(&SubCommand::update(tmp.path(), Vec::new()))
            .unwrap();
        assert_ne!(code, 0);
        assert_eq!(project.executed().len(), 1);
    }
}
