//! Package, link and event payload types exchanged with the host.

use serde::{Deserialize, Serialize};

/// A directed requirement: `source` requires `target` at `constraint`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    /// Constraint as written by the package author (e.g. `^2.0 || ^3.0`).
    pub constraint: String,
}

impl Link {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            constraint: constraint.into(),
        }
    }
}

/// An installed or installable package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// Normalized version used for lookups (e.g. `3.1.1.0`).
    pub version: String,
    /// Version as tagged (e.g. `3.1.1`, `v2.2.1p1`).
    pub pretty_version: String,
    #[serde(default)]
    pub requires: Vec<Link>,
    #[serde(default)]
    pub replaces: Vec<Link>,
    /// Successor named by an "abandoned" marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl Package {
    /// Create a package whose normalized and pretty versions are the same.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            name: name.into(),
            pretty_version: version.clone(),
            version,
            requires: Vec::new(),
            replaces: Vec::new(),
            replacement: None,
        }
    }

    /// Set the pretty version.
    #[must_use]
    pub fn with_pretty_version(mut self, pretty_version: impl Into<String>) -> Self {
        self.pretty_version = pretty_version.into();
        self
    }

    /// Add a `require` link from this package.
    #[must_use]
    pub fn requiring(mut self, target: impl Into<String>, constraint: impl Into<String>) -> Self {
        let link = Link::new(self.name.clone(), target, constraint);
        self.requires.push(link);
        self
    }

    /// Add a `replace` link from this package.
    #[must_use]
    pub fn replacing(mut self, target: impl Into<String>, constraint: impl Into<String>) -> Self {
        let link = Link::new(self.name.clone(), target, constraint);
        self.replaces.push(link);
        self
    }

    /// Names of every package this package requires directly.
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.requires.iter().map(|link| link.target.as_str())
    }
}

/// An in-flight install/update/uninstall operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install { package: Package },
    Update { initial: Package, target: Package },
    Uninstall { package: Package },
    /// Alias bookkeeping operations; never rewritten.
    MarkAliasInstalled { package: Package },
}

impl Operation {
    /// Short name of the operation kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::Update { .. } => "update",
            Self::Uninstall { .. } => "uninstall",
            Self::MarkAliasInstalled { .. } => "mark-alias-installed",
        }
    }

    /// The package that ends up installed, for install and update operations.
    #[must_use]
    pub fn installed_package(&self) -> Option<&Package> {
        match self {
            Self::Install { package } => Some(package),
            Self::Update { target, .. } => Some(target),
            Self::Uninstall { .. } | Self::MarkAliasInstalled { .. } => None,
        }
    }

    /// A new operation of the same kind that installs `replacement` instead.
    ///
    /// Uninstall and alias operations come back unchanged.
    #[must_use]
    pub fn with_installed_package(&self, replacement: Package) -> Self {
        match self {
            Self::Install { .. } => Self::Install {
                package: replacement,
            },
            Self::Update { initial, .. } => Self::Update {
                initial: initial.clone(),
                target: replacement,
            },
            Self::Uninstall { .. } | Self::MarkAliasInstalled { .. } => self.clone(),
        }
    }
}

/// A job in a dependency-solving request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Job command (`install`, `update`, `remove`, ...).
    pub cmd: String,
    pub package_name: Option<String>,
    pub constraint: Option<String>,
}

impl Job {
    #[must_use]
    pub fn new(cmd: impl Into<String>, package_name: Option<&str>) -> Self {
        Self {
            cmd: cmd.into(),
            package_name: package_name.map(str::to_string),
            constraint: None,
        }
    }
}

/// A dependency-solving request, as seen before the solver runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub jobs: Vec<Job>,
}

/// Candidate pool handed to the solver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolEvent {
    pub packages: Vec<Package>,
    /// Fixed packages the solver must not accept.
    pub unacceptable_fixed_packages: Vec<Package>,
}
