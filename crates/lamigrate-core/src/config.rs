use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the manifest file in the project root.
pub const MANIFEST_FILE: &str = "composer.json";

/// Options of the invoking command that are forwarded to the follow-up
/// `update --lock` run.
pub const LOCK_UPDATE_OPTIONS: [&str; 2] = ["ignore-platform-reqs", "ignore-platform-req"];

/// Runtime configuration for a migration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Project root; sub-commands run with this as `--working-dir`.
    pub cwd: PathBuf,

    /// Path to the manifest (`composer.json`).
    pub manifest_path: PathBuf,

    /// Vendor directory holding `composer/installed.json`.
    pub vendor_dir: PathBuf,

    /// Which plugin API the host speaks.
    pub generation: HostGeneration,

    /// Whether the host runs in dev mode (`--no-dev` not given).
    pub dev_mode: bool,

    /// Answer every confirmation prompt with "yes".
    pub assume_yes: bool,

    /// Verbosity of the run; above 0 the output of follow-up runs is shown.
    pub verbosity: u8,

    /// Options forwarded to `update --lock`, as `(name, value)` pairs.
    /// A `None` value renders as a bare flag.
    pub lock_update_options: Vec<(String, Option<String>)>,
}

/// Generation of the host plugin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostGeneration {
    /// Single-plugin flow: record replacements, then reconcile in two passes
    /// after the autoloader is dumped.
    Legacy,
    /// Rewrites solver jobs and swaps packages on in-flight operations.
    V1,
    /// Slipstreams replacements into the candidate pool.
    #[default]
    V2,
}

impl HostGeneration {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl std::str::FromStr for HostGeneration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            _ => Err(format!("Invalid host generation: {s}")),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd)
    }
}

impl MigrationConfig {
    /// Create a config rooted at `cwd` with the conventional manifest and
    /// vendor locations.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            manifest_path: cwd.join(MANIFEST_FILE),
            vendor_dir: cwd.join("vendor"),
            cwd,
            generation: HostGeneration::default(),
            dev_mode: true,
            assume_yes: false,
            verbosity: 0,
            lock_update_options: Vec::new(),
        }
    }

    /// Set the host generation.
    #[must_use]
    pub fn with_generation(mut self, generation: HostGeneration) -> Self {
        self.generation = generation;
        self
    }

    /// Set the vendor directory.
    #[must_use]
    pub fn with_vendor_dir(mut self, vendor_dir: PathBuf) -> Self {
        self.vendor_dir = vendor_dir;
        self
    }

    /// Set dev mode.
    #[must_use]
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Answer prompts automatically.
    #[must_use]
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Forward an option of the invoking command to `update --lock`.
    ///
    /// Options outside [`LOCK_UPDATE_OPTIONS`] are ignored.
    #[must_use]
    pub fn with_lock_update_option(mut self, name: &str, value: Option<String>) -> Self {
        if LOCK_UPDATE_OPTIONS.contains(&name) {
            self.lock_update_options.push((name.to_string(), value));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_project_layout() {
        let config = MigrationConfig::new(PathBuf::from("/project"));
        assert_eq!(config.manifest_path, PathBuf::from("/project/composer.json"));
        assert_eq!(config.vendor_dir, PathBuf::from("/project/vendor"));
        assert_eq!(config.generation, HostGeneration::V2);
        assert!(config.dev_mode);
    }

    #[test]
    fn test_only_known_lock_options_are_forwarded() {
        let config = MigrationConfig::new(PathBuf::from("/project"))
            .with_lock_update_option("ignore-platform-req", Some("php".into()))
            .with_lock_update_option("no-dev", None)
            .with_lock_update_option("ignore-platform-reqs", None);

        assert_eq!(
            config.lock_update_options,
            vec![
                ("ignore-platform-req".to_string(), Some("php".to_string())),
                ("ignore-platform-reqs".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_generation_parse() {
        assert_eq!("legacy".parse::<HostGeneration>(), Ok(HostGeneration::Legacy));
        assert_eq!("1".parse::<HostGeneration>(), Ok(HostGeneration::V1));
        assert_eq!("v2".parse::<HostGeneration>(), Ok(HostGeneration::V2));
        assert!("v3".parse::<HostGeneration>().is_err());
    }
}
