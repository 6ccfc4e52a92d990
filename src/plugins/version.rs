// ============================================
// TANZU CLI - Version Selection Policies
// ============================================

//! Pure functions that pick one version out of a candidate set.
//!
//! Every selector filters to valid semver strings, keeps the candidates its
//! policy admits, and returns the one with the highest semver precedence.
//! The empty string means no candidate qualified.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Stability policy used to resolve `latest`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSelector {
    /// Releases only: no pre-release, no build metadata.
    #[default]
    Stable,
    /// Releases plus pre-releases tagged `alpha`.
    Alpha,
    /// Anything without build metadata.
    Experimental,
    /// Every valid version.
    Any,
}

impl VersionSelector {
    /// Pick the highest admitted version from `versions`.
    pub fn select<S: AsRef<str>>(&self, versions: &[S]) -> String {
        let mut best: Option<(&str, Version)> = None;

        for raw in versions {
            let raw = raw.as_ref();
            let Some(version) = parse_version(raw) else {
                continue;
            };
            if !self.admits(&version) {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((_, current)) => version.cmp_precedence(current) == Ordering::Greater,
            };
            if replace {
                best = Some((raw, version));
            }
        }

        best.map(|(raw, _)| raw.to_string()).unwrap_or_default()
    }

    /// Whether this policy accepts a parsed version as a candidate.
    pub fn admits(&self, version: &Version) -> bool {
        match self {
            VersionSelector::Stable => version.pre.is_empty() && version.build.is_empty(),
            VersionSelector::Alpha => {
                version.build.is_empty()
                    && (version.pre.is_empty() || version.pre.as_str().contains("alpha"))
            }
            VersionSelector::Experimental => version.build.is_empty(),
            VersionSelector::Any => true,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VersionSelector::Stable => "stable",
            VersionSelector::Alpha => "alpha",
            VersionSelector::Experimental => "experimental",
            VersionSelector::Any => "any",
        };
        f.write_str(name)
    }
}

pub fn select_version_stable<S: AsRef<str>>(versions: &[S]) -> String {
    VersionSelector::Stable.select(versions)
}

pub fn select_version_alpha<S: AsRef<str>>(versions: &[S]) -> String {
    VersionSelector::Alpha.select(versions)
}

pub fn select_version_experimental<S: AsRef<str>>(versions: &[S]) -> String {
    VersionSelector::Experimental.select(versions)
}

pub fn select_version_any<S: AsRef<str>>(versions: &[S]) -> String {
    VersionSelector::Any.select(versions)
}

/// Parse a version string the way plugin repositories publish them.
///
/// A leading `v` is optional. `1` and `1.2` are shorthand for `1.0.0` and
/// `1.2.0`, but only when nothing follows them.
pub fn parse_version(raw: &str) -> Option<Version> {
    let body = raw.strip_prefix('v').unwrap_or(raw);
    if body.is_empty() {
        return None;
    }

    let is_short = !body.contains(['-', '+']) && body.split('.').count() < 3;
    if is_short {
        let parts: Vec<&str> = body.split('.').collect();
        if parts.iter().any(|p| !is_numeric_identifier(p)) {
            return None;
        }
        let padded = match parts.len() {
            1 => format!("{}.0.0", parts[0]),
            _ => format!("{}.{}.0", parts[0], parts[1]),
        };
        return Version::parse(&padded).ok();
    }

    Version::parse(body).ok()
}

/// True if `raw` is a valid semantic version.
pub fn is_valid_version(raw: &str) -> bool {
    parse_version(raw).is_some()
}

/// Semver precedence between two version strings; `None` if either is invalid.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_version(a)?.cmp_precedence(&parse_version(b)?))
}

fn is_numeric_identifier(part: &str) -> bool {
    !part.is_empty()
        && part.bytes().all(|b| b.is_ascii_digit())
        && (part == "0" || !part.starts_with('0'))
}
