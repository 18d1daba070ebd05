//! Paginated tag retrieval with filtering and early stop
//!
//! Pages are requested strictly one after another: whether page N+1 is needed
//! depends on what page N contained. A single deadline bounds the whole pass.
//!
//! Early stop assumes the remote lists tags newest first (or in another stable
//! order where a page made only of known tags means nothing new follows). This
//! is a heuristic; if the listing order changes, new tags past that page would
//! be missed until a full `all_versions` refresh.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MIN_VERSION, OVERALL_TIMEOUT, PAGE_SIZE};
use crate::version::error::FetchError;
use crate::version::model::{Version, normalize_version, parse_version};
use crate::version::registry::TagRegistry;

/// Options of a single retrieval pass
///
/// `all_versions` overrides both other filters. Without it, a missing or blank
/// `min_version` defaults to [`DEFAULT_MIN_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Lower bound such as "go1.22" or "1.22"
    pub min_version: Option<String>,
    /// Lower bound on the estimated release year
    pub min_year: Option<i64>,
    pub all_versions: bool,
    /// Deadline for the whole multi-page pass
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            min_version: None,
            min_year: None,
            all_versions: false,
            timeout: OVERALL_TIMEOUT,
        }
    }
}

/// Newly discovered tags, plus the reason retrieval stopped early if it did
#[derive(Debug, Default)]
pub struct TagFetch {
    /// Tag names in first-discovery order
    pub tags: Vec<String>,
    pub error: Option<FetchError>,
}

impl TagFetch {
    fn partial(tags: Vec<String>, error: FetchError) -> Self {
        warn!("{}. Returning {} tags fetched so far.", error, tags.len());
        Self {
            tags,
            error: Some(error),
        }
    }
}

/// Effective filters after resolving [`FetchOptions`]
#[derive(Debug)]
struct TagFilter {
    min_version: Option<Version>,
    min_year: Option<i64>,
}

impl TagFilter {
    fn resolve(options: &FetchOptions) -> Result<Self, FetchError> {
        if options.all_versions {
            return Ok(Self {
                min_version: None,
                min_year: None,
            });
        }

        let raw = options
            .min_version
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_MIN_VERSION);
        let min_version = parse_version(&normalize_version(raw)).map_err(|source| {
            FetchError::InvalidFilterConfiguration {
                value: raw.to_string(),
                source,
            }
        })?;

        Ok(Self {
            min_version: Some(min_version),
            min_year: options.min_year.filter(|year| *year > 0),
        })
    }

    fn accepts(&self, version: &Version) -> bool {
        let above_min = self
            .min_version
            .as_ref()
            .is_none_or(|min| version.compare(min).is_ge());
        let recent_enough = self
            .min_year
            .is_none_or(|year| version.estimated_year() >= year);
        above_min && recent_enough
    }

    fn describe(&self) -> String {
        match (&self.min_version, self.min_year) {
            (None, _) => "all versions (no filter)".to_string(),
            (Some(min), None) => format!("versions >= {}", min.tag),
            (Some(min), Some(year)) => {
                format!("versions >= {} from year >= {}", min.tag, year)
            }
        }
    }
}

#[derive(Debug, Default)]
struct PageCounts {
    new: usize,
    existing: usize,
    skipped: usize,
}

/// Fetch tag names not yet in `existing_tags`.
///
/// Returns `Err` only when the minimum-version filter itself is invalid, in
/// which case nothing is requested. Every other failure (rate limiting, abuse
/// detection, transport or server errors, the overall deadline) yields `Ok`
/// with the tags collected so far and [`TagFetch::error`] set.
pub async fn fetch_tags<R>(
    registry: &R,
    existing_tags: &HashSet<String>,
    options: &FetchOptions,
) -> Result<TagFetch, FetchError>
where
    R: TagRegistry + ?Sized,
{
    let filter = TagFilter::resolve(options)?;

    info!(
        "Starting to fetch tags (filter: {}, timeout: {:?} overall)",
        filter.describe(),
        options.timeout
    );

    let deadline = Instant::now() + options.timeout;
    let mut tags: Vec<String> = Vec::new();
    let mut collected: HashSet<String> = HashSet::new();
    let mut page = 1;

    loop {
        if Instant::now() >= deadline {
            return Ok(TagFetch::partial(
                tags,
                FetchError::Timeout {
                    after: options.timeout,
                },
            ));
        }

        debug!("Fetching page {}", page);
        let started = Instant::now();

        let response = match timeout_at(deadline, registry.fetch_tag_page(page, PAGE_SIZE)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Ok(TagFetch::partial(tags, FetchError::from_registry(page, e))),
            Err(_) => {
                return Ok(TagFetch::partial(
                    tags,
                    FetchError::Timeout {
                        after: options.timeout,
                    },
                ));
            }
        };

        if response.names.is_empty() {
            info!("No more tags found");
            break;
        }

        let mut counts = PageCounts::default();
        for name in &response.names {
            if existing_tags.contains(name) {
                counts.existing += 1;
                continue;
            }

            let Ok(version) = parse_version(name) else {
                counts.skipped += 1;
                continue;
            };

            if filter.accepts(&version) && collected.insert(name.clone()) {
                tags.push(name.clone());
                counts.new += 1;
            } else {
                counts.skipped += 1;
            }
        }

        info!(
            "Fetched {} tags on page {} (new: {}, existing: {}, skipped: {}, took {:?}, total new: {})",
            response.names.len(),
            page,
            counts.new,
            counts.existing,
            counts.skipped,
            started.elapsed(),
            tags.len()
        );

        if counts.existing == response.names.len() {
            info!("Stopped early: all tags on page {} already exist locally", page);
            break;
        }

        if !response.has_next {
            info!("Reached last page");
            break;
        }

        page += 1;
    }

    info!("Successfully fetched {} new tags in total", tags.len());
    Ok(TagFetch { tags, error: None })
}
