//! Package name rewrite rules.
//!
//! Maps a deprecated Zend Framework / Apigility package name onto its Laminas,
//! Mezzio or Laminas API Tools successor. Evaluation order is fixed:
//! ignore list, exact exceptions, then prefix patterns from the most
//! specific prefix to the most general one. Several old prefixes are
//! prefixes of each other (`zf-apigility-` and `zf-`,
//! `zend-expressive-zend` and `zend-`), so the pattern order is load-bearing.

use crate::package::Package;
use tracing::info;

/// A prefix rewrite: `old_prefix<suffix>` becomes `new_prefix<suffix>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternRule {
    pub old_prefix: &'static str,
    pub new_prefix: &'static str,
}

/// Static rewrite table.
#[derive(Debug)]
pub struct NameRewriteRules {
    /// Vendor prefixes that mark a package as an old package.
    pub old_namespaces: &'static [&'static str],
    /// Old packages without a successor; never rewritten.
    pub ignore: &'static [&'static str],
    /// Names that do not follow the suffix convention.
    pub exact: &'static [(&'static str, &'static str)],
    /// Prefix rules, most specific first.
    pub patterns: &'static [PatternRule],
}

/// The Zend Framework → Laminas rule set.
pub static RULES: NameRewriteRules = NameRewriteRules {
    old_namespaces: &["zendframework/", "zfcampus/"],
    ignore: &[
        "zendframework/zend-debug",
        "zendframework/zend-version",
        "zendframework/zendservice-apple-apns",
        "zendframework/zendservice-google-gcm",
        "zfcampus/zf-apigility-example",
        "zfcampus/zf-angular",
        "zfcampus/zf-console",
        "zfcampus/zf-deploy",
    ],
    exact: &[
        ("zendframework/zenddiagnostics", "laminas/laminas-diagnostics"),
        ("zendframework/zendoauth", "laminas/laminas-oauth"),
        ("zendframework/zendservice-recaptcha", "laminas/laminas-recaptcha"),
        ("zendframework/zendservice-twitter", "laminas/laminas-twitter"),
        ("zendframework/zendxml", "laminas/laminas-xml"),
        ("zendframework/zend-expressive", "mezzio/mezzio"),
        ("zendframework/zend-problem-details", "mezzio/mezzio-problem-details"),
        ("zfcampus/zf-apigility", "laminas-api-tools/api-tools"),
        ("zfcampus/zf-composer-autoloading", "laminas/laminas-composer-autoloading"),
        ("zfcampus/zf-development-mode", "laminas/laminas-development-mode"),
    ],
    patterns: &[
        PatternRule {
            old_prefix: "zendframework/zend-expressive-zend",
            new_prefix: "mezzio/mezzio-laminas",
        },
        PatternRule {
            old_prefix: "zendframework/zend-expressive-",
            new_prefix: "mezzio/mezzio-",
        },
        PatternRule {
            old_prefix: "zfcampus/zf-apigility-",
            new_prefix: "laminas-api-tools/api-tools-",
        },
        PatternRule {
            old_prefix: "zfcampus/zf-",
            new_prefix: "laminas-api-tools/api-tools-",
        },
        PatternRule {
            old_prefix: "zendframework/zend-",
            new_prefix: "laminas/laminas-",
        },
    ],
};

impl NameRewriteRules {
    /// Whether `name` lives in one of the old vendor namespaces.
    ///
    /// Ignored packages are still old packages; use [`Self::is_rewritable`]
    /// to ask whether a successor exists.
    #[must_use]
    pub fn is_old_package(&self, name: &str) -> bool {
        self.old_namespaces
            .iter()
            .any(|prefix| name.starts_with(prefix))
    }

    /// Whether `name` is an old package that is not on the ignore list.
    #[must_use]
    pub fn is_rewritable(&self, name: &str) -> bool {
        self.is_old_package(name) && !self.is_ignored(name)
    }

    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.contains(&name)
    }

    /// Rewrite `name` to its successor.
    ///
    /// Total: names without a successor come back unchanged, and callers
    /// treat `transform(name) == name` as "no replacement".
    #[must_use]
    pub fn transform(&self, name: &str) -> String {
        if self.is_ignored(name) {
            return name.to_string();
        }

        if let Some((_, new)) = self.exact.iter().find(|(old, _)| *old == name) {
            return (*new).to_string();
        }

        for rule in self.patterns {
            if let Some(suffix) = name.strip_prefix(rule.old_prefix) {
                return format!("{}{suffix}", rule.new_prefix);
            }
        }

        name.to_string()
    }

    /// Successor name for a concrete package, if any.
    ///
    /// An "abandoned, use X instead" hint on the package wins over the
    /// table.
    #[must_use]
    pub fn replacement_for(&self, package: &Package) -> Option<String> {
        if !self.is_rewritable(&package.name) {
            return None;
        }

        if let Some(hint) = package.replacement.as_deref() {
            return Some(hint.to_string());
        }

        let replacement = self.transform(&package.name);
        (replacement != package.name).then_some(replacement)
    }

    /// The old package a new package declares to `replace`, if any.
    #[must_use]
    pub fn old_equivalent_of(&self, package: &Package) -> Option<String> {
        package
            .replaces
            .iter()
            .find(|link| self.is_old_package(&link.target))
            .map(|link| link.target.clone())
    }

    /// Rewrite a command line package argument (`name`, `name:version`,
    /// `name=version` or `name version`).
    ///
    /// Returns `None` when the argument has no successor and must stay as
    /// given. A rewritten argument always uses `:` as separator.
    #[must_use]
    pub fn rewrite_package_argument(&self, argument: &str) -> Option<String> {
        let (name, version) = match argument.split_once([' ', ':', '=']) {
            Some((name, version)) => (name, Some(version)),
            None => (argument, None),
        };

        if !self.is_rewritable(name) {
            return None;
        }

        let replacement = self.transform(name);
        if replacement == name {
            return None;
        }

        Some(match version {
            Some(version) => format!("{replacement}:{version}"),
            None => replacement,
        })
    }

    /// Package arguments of a host command, rewritten when the command is
    /// `require`. Other commands keep their arguments.
    #[must_use]
    pub fn rewrite_command_arguments(&self, command: &str, packages: &[String]) -> Vec<String> {
        if command != "require" {
            return packages.to_vec();
        }

        packages
            .iter()
            .map(|argument| match self.rewrite_package_argument(argument) {
                Some(rewritten) => {
                    info!("Changing package in current command from {argument} to {rewritten}");
                    rewritten
                }
                None => argument.clone(),
            })
            .collect()
    }
}
