use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes, one per [`MigrationError`] variant.
pub mod codes {
    pub const MIGRATE_RESOLUTION_FAILED: &str = "MIGRATE_RESOLUTION_FAILED";
    pub const MIGRATE_LOCK_UPDATE_FAILED: &str = "MIGRATE_LOCK_UPDATE_FAILED";
    pub const MIGRATE_PACKAGE_REMOVAL_FAILED: &str = "MIGRATE_PACKAGE_REMOVAL_FAILED";
    pub const MIGRATE_MANIFEST_READ: &str = "MIGRATE_MANIFEST_READ";
    pub const MIGRATE_MANIFEST_WRITE: &str = "MIGRATE_MANIFEST_WRITE";
    pub const MIGRATE_MANIFEST_INVALID: &str = "MIGRATE_MANIFEST_INVALID";
    pub const MIGRATE_CONSTRAINT_INVALID: &str = "MIGRATE_CONSTRAINT_INVALID";
    pub const MIGRATE_COMMAND_FAILED: &str = "MIGRATE_COMMAND_FAILED";
}

/// Errors raised by the rewrite engine.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error(
        "Could not determine dependency graph for package {package}; need that graph to put it \
         into the proper `require` or `require-dev` requirements"
    )]
    Resolution { package: String },

    #[error("Migration failed. Could not update `composer.lock`!")]
    LockUpdateFailed,

    #[error("Migration failed. Could not remove the following packages: {}", packages.join(", "))]
    PackageRemovalFailed { packages: Vec<String> },

    #[error("Failed to read manifest at {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest at {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("Invalid version constraint '{constraint}': {reason}")]
    ConstraintInvalid { constraint: String, reason: String },

    #[error("Failed to run `{command}`: {reason}")]
    CommandFailed { command: String, reason: String },
}

impl MigrationError {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => codes::MIGRATE_RESOLUTION_FAILED,
            Self::LockUpdateFailed => codes::MIGRATE_LOCK_UPDATE_FAILED,
            Self::PackageRemovalFailed { .. } => codes::MIGRATE_PACKAGE_REMOVAL_FAILED,
            Self::ManifestRead { .. } => codes::MIGRATE_MANIFEST_READ,
            Self::ManifestWrite { .. } => codes::MIGRATE_MANIFEST_WRITE,
            Self::ManifestInvalid(_) => codes::MIGRATE_MANIFEST_INVALID,
            Self::ConstraintInvalid { .. } => codes::MIGRATE_CONSTRAINT_INVALID,
            Self::CommandFailed { .. } => codes::MIGRATE_COMMAND_FAILED,
        }
    }

    /// Whether this is one of the "migration failed" errors raised when a
    /// host sub-command exits non-zero.
    #[must_use]
    pub fn is_migration_failure(&self) -> bool {
        matches!(
            self,
            Self::LockUpdateFailed | Self::PackageRemovalFailed { .. }
        )
    }

    pub fn constraint_invalid(constraint: &str, reason: impl Into<String>) -> Self {
        Self::ConstraintInvalid {
            constraint: constraint.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_failure_lists_packages() {
        let err = MigrationError::PackageRemovalFailed {
            packages: vec!["laminas/laminas-mvc".into(), "laminas/laminas-form".into()],
        };
        assert_eq!(
            err.to_string(),
            "Migration failed. Could not remove the following packages: laminas/laminas-mvc, laminas/laminas-form"
        );
        assert!(err.is_migration_failure());
    }

    #[test]
    fn test_resolution_is_not_a_migration_failure() {
        let err = MigrationError::Resolution {
            package: "zendframework/zend-mvc".into(),
        };
        assert_eq!(err.code(), codes::MIGRATE_RESOLUTION_FAILED);
        assert!(!err.is_migration_failure());
        assert!(err.to_string().contains("zendframework/zend-mvc"));
    }

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::MIGRATE_RESOLUTION_FAILED,
            codes::MIGRATE_LOCK_UPDATE_FAILED,
            codes::MIGRATE_PACKAGE_REMOVAL_FAILED,
            codes::MIGRATE_MANIFEST_READ,
            codes::MIGRATE_MANIFEST_WRITE,
            codes::MIGRATE_MANIFEST_INVALID,
            codes::MIGRATE_CONSTRAINT_INVALID,
            codes::MIGRATE_COMMAND_FAILED,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
