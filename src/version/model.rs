//! Go release version model
//!
//! Parses tags such as `go1.22.1` or `go1.22rc1` into [`Version`] values,
//! defines their total order and groups them into major.minor buckets.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::version::error::VersionError;

/// Prefix every Go release tag carries
pub const TAG_PREFIX: &str = "go";

/// Year Go 1.0 was released, anchor of [`Version::estimated_year`]
const GO1_RELEASE_YEAR: i64 = 2012;

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^go(\d+)\.(\d+)(?:\.(\d+))?(?:rc(\d+))?$").expect("valid version regex")
});

/// A parsed Go release tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Original tag name, the identity key within a catalog
    pub tag: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Release candidate number, 0 for final releases
    #[serde(rename = "rc")]
    pub candidate_number: u32,
    pub full_version: String,
    #[serde(rename = "is_rc")]
    pub is_release_candidate: bool,
    /// When this entry was captured; set by the catalog merge, never by the parser
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Versions sharing the same major.minor, sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGroup {
    /// e.g. "1.22"
    pub major_minor: String,
    pub versions: Vec<Version>,
}

/// The persisted catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsData {
    pub fetched_at: DateTime<Utc>,
    pub groups: Vec<VersionGroup>,
}

impl VersionsData {
    /// Iterate over every version of every group
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.groups.iter().flat_map(|g| g.versions.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.versions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.versions.is_empty())
    }
}

/// Parse a tag like `go1.22.1` or `go1.22rc1`.
///
/// The input must already carry the `go` prefix and no surrounding whitespace;
/// use [`normalize_version`] first for user-supplied strings.
pub fn parse_version(tag: &str) -> Result<Version, VersionError> {
    let invalid = || VersionError::InvalidFormat(tag.to_string());

    let captures = VERSION_REGEX.captures(tag).ok_or_else(invalid)?;
    let number = |index: usize| -> Result<Option<u32>, VersionError> {
        captures
            .get(index)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| invalid()))
            .transpose()
    };

    let major = number(1)?.ok_or_else(invalid)?;
    let minor = number(2)?.ok_or_else(invalid)?;
    let patch = number(3)?.unwrap_or(0);
    let candidate = number(4)?;

    Ok(Version::new(tag, major, minor, patch, candidate))
}

/// Trim whitespace and prepend the `go` prefix when missing.
///
/// Does not validate numeric structure.
pub fn normalize_version(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with(TAG_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{TAG_PREFIX}{trimmed}")
    }
}

impl Version {
    fn new(tag: &str, major: u32, minor: u32, patch: u32, candidate: Option<u32>) -> Self {
        let mut full_version = format!("{major}.{minor}");
        if patch > 0 {
            full_version.push_str(&format!(".{patch}"));
        }
        if let Some(rc) = candidate {
            full_version.push_str(&format!("rc{rc}"));
        }

        Self {
            tag: tag.to_string(),
            major,
            minor,
            patch,
            candidate_number: candidate.unwrap_or(0),
            full_version,
            is_release_candidate: candidate.is_some(),
            fetched_at: None,
        }
    }

    /// Returns the group key, e.g. "1.22"
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// Rough release year: Go 1.0 shipped in 2012 and minors land about twice a year,
    /// so this only approximates the real date.
    pub fn estimated_year(&self) -> i64 {
        GO1_RELEASE_YEAR + (i64::from(self.major) - 1) + i64::from(self.minor) / 6
    }

    /// Total order over (major, minor, patch), then release candidates below
    /// the final release, then by candidate number.
    pub fn compare(&self, other: &Version) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| {
                match (self.is_release_candidate, other.is_release_candidate) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (true, true) => self.candidate_number.cmp(&other.candidate_number),
                    (false, false) => Ordering::Equal,
                }
            })
    }
}

/// Partition versions by major.minor and sort groups and their contents ascending.
///
/// Tags that compare equal (`go1.22` and `go1.22.0`) are ordered by tag so the
/// output does not depend on input order.
pub fn group_and_sort<I>(versions: I) -> Vec<VersionGroup>
where
    I: IntoIterator<Item = Version>,
{
    let mut buckets: BTreeMap<(u32, u32), Vec<Version>> = BTreeMap::new();
    for version in versions {
        buckets
            .entry((version.major, version.minor))
            .or_default()
            .push(version);
    }

    buckets
        .into_iter()
        .map(|((major, minor), mut versions)| {
            versions.sort_by(|a, b| a.compare(b).then_with(|| a.tag.cmp(&b.tag)));
            VersionGroup {
                major_minor: format!("{major}.{minor}"),
                versions,
            }
        })
        .collect()
}
