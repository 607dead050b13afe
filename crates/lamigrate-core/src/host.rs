//! Seams to the package manager hosting the migration.

use crate::error::MigrationError;
use crate::graph::InstalledRepository;
use crate::package::Package;
use std::fmt;
use std::path::PathBuf;

/// Services the host package manager provides to the engine.
pub trait Host {
    /// Installed packages, including the root project.
    fn installed(&self) -> &dyn InstalledRepository;

    /// Whether the root project lists `name` under `require-dev`.
    fn is_dev_requirement(&self, name: &str) -> bool;

    /// Look up an installable package by name and exact version.
    fn find_available_package(&self, name: &str, version: &str) -> Option<Package>;

    /// Run a package manager sub-command and return its exit code.
    fn run_command(&mut self, command: &SubCommand) -> Result<i32, MigrationError>;

    /// Remove an installed package from disk.
    fn uninstall(&mut self, package: &Package) -> Result<(), MigrationError>;

    /// Ask a yes/no question; `default` is the answer to an empty reply.
    fn confirm(&mut self, question: &str, default: bool) -> bool;
}

/// Sub-command kinds the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubCommandKind {
    Update,
    Remove,
}

impl SubCommandKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

/// A follow-up invocation of the package manager.
///
/// Plugins and scripts are always disabled so the run cannot re-enter the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommand {
    pub kind: SubCommandKind,
    pub working_dir: PathBuf,
    pub packages: Vec<String>,
    /// Extra `--name[=value]` options.
    pub options: Vec<(String, Option<String>)>,
}

impl SubCommand {
    /// `update` restricted to `packages`; with no packages only the lock
    /// file is refreshed.
    #[must_use]
    pub fn update(working_dir: impl Into<PathBuf>, packages: Vec<String>) -> Self {
        Self {
            kind: SubCommandKind::Update,
            working_dir: working_dir.into(),
            packages,
            options: Vec::new(),
        }
    }

    /// `remove` for `packages`, updating the lock file in the same run.
    #[must_use]
    pub fn remove(working_dir: impl Into<PathBuf>, packages: Vec<String>) -> Self {
        Self {
            kind: SubCommandKind::Remove,
            working_dir: working_dir.into(),
            packages,
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: &[(String, Option<String>)]) -> Self {
        self.options.extend_from_slice(options);
        self
    }

    /// Whether this is a lock-only update.
    #[must_use]
    pub fn is_lock_update(&self) -> bool {
        self.kind == SubCommandKind::Update && self.packages.is_empty()
    }

    /// Argument vector, without the program name.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.kind.as_str().to_string()];
        if self.is_lock_update() {
            args.push("--lock".to_string());
        }
        args.push("--no-plugins".to_string());
        args.push("--no-scripts".to_string());
        args.push(format!("--working-dir={}", self.working_dir.display()));
        for (name, value) in &self.options {
            match value {
                Some(value) => args.push(format!("--{name}={value}")),
                None => args.push(format!("--{name}")),
            }
        }
        args.extend(self.packages.iter().cloned());
        args
    }
}

impl fmt::Display for SubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}
