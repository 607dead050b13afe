#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Rewrite-and-reconcile engine for the Zend Framework → Laminas migration.
//!
//! The engine sits between a Composer-like host and the project manifest:
//! - [`rules`] maps deprecated package names to their successors
//! - [`manifest`] is a copy-on-write view of `composer.json`
//! - [`installation`] walks the installed dependency graph to decide where a
//!   replacement requirement belongs and which constraint it gets
//! - [`orchestrator`] reacts to host lifecycle events

pub mod config;
pub mod constraint;
pub mod error;
pub mod graph;
pub mod host;
pub mod installation;
pub mod manifest;
pub mod orchestrator;
pub mod package;
pub mod rules;

#[cfg(test)]
mod test_support;

pub use config::{HostGeneration, MigrationConfig};
pub use constraint::{is_upgrade, locked_constraint, normalize_version, Constraint};
pub use error::{codes, MigrationError};
pub use graph::{Dependent, InstalledGraph, InstalledRepository};
pub use host::{Host, SubCommand};
pub use installation::{InstallationDetails, InstallationGraphQuery};
pub use manifest::{JsonFile, ManifestDocument, ManifestStore, ReconciledConstraint};
pub use orchestrator::Orchestrator;
pub use package::{Job, Link, Operation, Package, PoolEvent, Request};
pub use rules::{NameRewriteRules, RULES};
