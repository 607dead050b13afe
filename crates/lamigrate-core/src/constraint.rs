//! Composer version constraints on top of `semver`.
//!
//! Only as much of the Composer dialect as the reconciler needs: parsing
//! constraints written by package authors, computing their lower bound and
//! comparing bounds the way Composer's `isUpgrade` does.
//!
//! Handles:
//! - OR alternatives: `^1.0 || ^2.0`, `^1.0 | ^2.0`
//! - AND comparators separated by spaces or commas: `>=1.2 <2.0`
//! - Composer tilde: `~1.2` is `>=1.2.0 <2.0.0`, `~1.2.3.0` is `>=1.2.3 <1.2.4`
//! - Wildcards: `1.2.*`, `2.x`, `*`
//! - Hyphen ranges: `1.0 - 2.0`
//! - Stability flags (`^1.0@dev`) and branch names (`dev-master`, `2.x-dev`)

use crate::error::MigrationError;
use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use std::fmt;

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pretty: String,
    /// Alternatives; empty when the constraint only names branches.
    alternatives: Vec<VersionReq>,
}

impl Constraint {
    /// Parse a Composer constraint.
    pub fn parse(input: &str) -> Result<Self, MigrationError> {
        let pretty = input.trim();
        if pretty.is_empty() {
            return Err(MigrationError::constraint_invalid(input, "empty constraint"));
        }

        let mut alternatives = Vec::new();
        for alternative in pretty.replace("||", "|").split('|') {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(MigrationError::constraint_invalid(
                    input,
                    "empty alternative",
                ));
            }

            if is_branch(alternative) {
                continue;
            }

            let comparators = convert_alternative(alternative)
                .map_err(|reason| MigrationError::constraint_invalid(input, reason))?;
            let req = if comparators.is_empty() {
                VersionReq::STAR
            } else {
                VersionReq::parse(&comparators.join(", "))
                    .map_err(|e| MigrationError::constraint_invalid(input, e.to_string()))?
            };
            alternatives.push(req);
        }

        Ok(Self {
            pretty: pretty.to_string(),
            alternatives,
        })
    }

    /// The constraint as written.
    #[must_use]
    pub fn pretty(&self) -> &str {
        &self.pretty
    }

    /// Whether the constraint only names development branches.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Smallest version the constraint can accept.
    ///
    /// `None` for branch constraints, which have no numeric bound.
    #[must_use]
    pub fn lower_bound(&self) -> Option<Version> {
        self.alternatives.iter().map(req_lower_bound).min()
    }

    /// Whether `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty)
    }
}

/// Composer's upgrade test: moving from `from` to `to` is an upgrade (or a
/// no-op) when `from <= to`. Anything involving a branch counts as an
/// upgrade.
#[must_use]
pub fn is_upgrade(from: Option<&Version>, to: Option<&Version>) -> bool {
    match (from, to) {
        (Some(from), Some(to)) => from <= to,
        _ => true,
    }
}

/// Constraint that pins a replacement to the patch series of an installed
/// version, while still admitting re-tagged fix releases (`2.2.1p1`).
#[must_use]
pub fn locked_constraint(pretty_version: &str) -> String {
    format!("~{pretty_version}.0")
}

/// Parse a Composer version (`1.2`, `v1.2.3`, `1.2.3.0`, `2.0.0-beta1`,
/// `2.2.1p1`) into a semver version. Returns `None` for branch names.
#[must_use]
pub fn normalize_version(input: &str) -> Option<Version> {
    let (segments, pre) = split_version(input).ok()?;
    let mut version = Version::new(
        segments[0],
        segments.get(1).copied().unwrap_or(0),
        segments.get(2).copied().unwrap_or(0),
    );
    if let Some(pre) = pre {
        version.pre = pre;
    }
    Some(version)
}

fn is_branch(alternative: &str) -> bool {
    let name = alternative
        .trim_start_matches(['=', ' '])
        .split(" as ")
        .next()
        .unwrap_or_default();
    name.starts_with("dev-")
        || (name.ends_with("-dev") && name.contains(['x', 'X', '*']))
}

fn req_lower_bound(req: &VersionReq) -> Version {
    req.comparators
        .iter()
        .map(comparator_lower_bound)
        .max()
        .unwrap_or_else(|| Version::new(0, 0, 0))
}

fn comparator_lower_bound(comparator: &Comparator) -> Version {
    match comparator.op {
        Op::Less | Op::LessEq => Version::new(0, 0, 0),
        _ => {
            let mut version = Version::new(
                comparator.major,
                comparator.minor.unwrap_or(0),
                comparator.patch.unwrap_or(0),
            );
            version.pre = comparator.pre.clone();
            version
        }
    }
}

/// Convert one OR-alternative into semver comparator strings.
fn convert_alternative(alternative: &str) -> Result<Vec<String>, String> {
    if let Some((start, end)) = alternative.split_once(" - ") {
        return Ok(vec![
            format!(">={}", padded(start.trim())?),
            format!("<={}", padded(end.trim())?),
        ]);
    }

    let mut comparators = Vec::new();
    let mut pending_op = String::new();

    for token in alternative.split([' ', ',']).filter(|t| !t.is_empty()) {
        // Operators may be separated from their version: `>= 1.2`
        if token.chars().all(|c| "<>=!^~".contains(c)) {
            pending_op.push_str(token);
            continue;
        }

        let token = format!("{pending_op}{token}");
        pending_op.clear();
        comparators.extend(convert_comparator(&token)?);
    }

    if !pending_op.is_empty() {
        return Err(format!("dangling operator '{pending_op}'"));
    }

    Ok(comparators)
}

fn convert_comparator(token: &str) -> Result<Vec<String>, String> {
    // Stability flags do not narrow the version range.
    let token = token.split('@').next().unwrap_or_default();
    if token.is_empty() {
        return Ok(Vec::new());
    }

    let op_len = token
        .find(|c: char| !"<>=!^~".contains(c))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);

    if op == "!=" || op == "<>" {
        // Exclusions carry no bound.
        return Ok(Vec::new());
    }

    if version.contains(['*', 'x', 'X']) {
        return wildcard(version);
    }

    let (segments, pre) = split_version(version)?;
    let pre = pre.map(|p| format!("-{p}")).unwrap_or_default();
    let major = segments[0];
    let minor = segments.get(1).copied().unwrap_or(0);
    let patch = segments.get(2).copied().unwrap_or(0);
    let full = format!("{major}.{minor}.{patch}{pre}");

    Ok(match op {
        "~" => match segments.len() {
            1 | 2 => vec![format!(">={full}"), format!("<{}.0.0", next(major)?)],
            3 => vec![format!(">={full}"), format!("<{major}.{}.0", next(minor)?)],
            _ => vec![format!(">={full}"), format!("<{major}.{minor}.{}", next(patch)?)],
        },
        // semver only takes a pre-release after all three segments.
        "^" if !pre.is_empty() => vec![format!("^{full}")],
        "^" => {
            let partial = segments
                .iter()
                .take(3)
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(".");
            vec![format!("^{partial}")]
        }
        ">=" | ">" | "<" | "<=" => vec![format!("{op}{full}")],
        "" | "=" | "==" => vec![format!("={full}")],
        other => return Err(format!("unsupported operator '{other}'")),
    })
}

fn wildcard(version: &str) -> Result<Vec<String>, String> {
    let version = version.trim_start_matches(['v', 'V']);
    let mut segments = Vec::new();
    for part in version.split('.') {
        if matches!(part, "*" | "x" | "X") {
            break;
        }
        segments.push(
            part.parse::<u64>()
                .map_err(|_| format!("invalid wildcard version '{version}'"))?,
        );
    }

    Ok(match segments.as_slice() {
        [] => Vec::new(),
        [major] => vec![format!(">={major}.0.0"), format!("<{}.0.0", next(*major)?)],
        [major, minor] => vec![
            format!(">={major}.{minor}.0"),
            format!("<{major}.{}.0", next(*minor)?),
        ],
        [major, minor, patch, ..] => vec![
            format!(">={major}.{minor}.{patch}"),
            format!("<{major}.{minor}.{}", next(*patch)?),
        ],
    })
}

/// Exclusive upper bound segment.
fn next(segment: u64) -> Result<u64, String> {
    segment
        .checked_add(1)
        .ok_or_else(|| format!("version segment {segment} is too large"))
}

fn padded(version: &str) -> Result<String, String> {
    let (segments, pre) = split_version(version)?;
    let pre = pre.map(|p| format!("-{p}")).unwrap_or_default();
    Ok(format!(
        "{}.{}.{}{pre}",
        segments[0],
        segments.get(1).copied().unwrap_or(0),
        segments.get(2).copied().unwrap_or(0)
    ))
}

/// Split a Composer version into numeric segments (at most four, the
/// fourth kept only for tilde arithmetic) and a stability suffix.
fn split_version(input: &str) -> Result<(Vec<u64>, Option<Prerelease>), String> {
    let version = input.trim().trim_start_matches(['v', 'V']);
    let numeric_end = version
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(version.len());
    let (numeric, suffix) = version.split_at(numeric_end);
    let numeric = numeric.trim_end_matches('.');

    if numeric.is_empty() {
        return Err(format!("'{input}' is not a version"));
    }

    let segments = numeric
        .split('.')
        .map(|s| s.parse::<u64>().map_err(|_| format!("'{input}' is not a version")))
        .collect::<Result<Vec<_>, _>>()?;

    if segments.len() > 4 {
        return Err(format!("'{input}' has too many segments"));
    }

    Ok((segments, stability_suffix(input, suffix)?))
}

fn stability_suffix(input: &str, suffix: &str) -> Result<Option<Prerelease>, String> {
    let suffix = suffix
        .trim_start_matches(['-', '_', '.'])
        .to_ascii_lowercase();
    if suffix.is_empty() {
        return Ok(None);
    }

    let word_end = suffix
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(suffix.len());
    let (word, number) = suffix.split_at(word_end);
    let number = number.trim_start_matches(['.', '-', '_']);

    let label = match word {
        "alpha" | "a" => "alpha",
        "beta" | "b" => "beta",
        "rc" => "rc",
        "dev" => "dev",
        // Patch releases sort with their base version.
        "patch" | "pl" | "p" | "stable" => return Ok(None),
        _ => return Err(format!("unknown stability in '{input}'")),
    };

    let text = if number.is_empty() {
        label.to_string()
    } else {
        let number: u64 = number
            .parse()
            .map_err(|_| format!("unknown stability in '{input}'"))?;
        format!("{label}.{number}")
    };

    Prerelease::new(&text).map(Some).map_err(|e| e.to_string())
}
