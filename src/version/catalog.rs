//! Catalog merge and refresh
//!
//! Combines the cached catalog with newly fetched tags and persists the result.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info, warn};

use crate::version::error::{CacheError, FetchError, RefreshError};
use crate::version::fetcher::{FetchOptions, fetch_tags};
use crate::version::model::{Version, VersionsData, group_and_sort, parse_version};
use crate::version::registry::TagRegistry;

/// Trait for loading and storing the version catalog
#[cfg_attr(test, automock)]
pub trait CatalogStorer: Send + Sync {
    /// Load the stored catalog, `None` when nothing was stored yet
    fn load_catalog(&self) -> Result<Option<VersionsData>, CacheError>;

    /// Replace the stored catalog
    fn save_catalog(&self, data: &VersionsData) -> Result<(), CacheError>;
}

/// Result of a catalog refresh
#[derive(Debug)]
pub struct RefreshOutcome {
    pub catalog: VersionsData,
    /// Number of versions added by this refresh
    pub added: usize,
    /// Set when retrieval stopped early; `catalog` still holds everything gathered
    pub fetch_error: Option<FetchError>,
}

/// Tag names already present in `catalog`
pub fn existing_tags(catalog: Option<&VersionsData>) -> HashSet<String> {
    catalog
        .map(|data| data.versions().map(|v| v.tag.clone()).collect())
        .unwrap_or_default()
}

/// Whether the cached catalog is missing or older than `max_age`
pub fn should_update(
    catalog: Option<&VersionsData>,
    max_age: Duration,
    now: DateTime<Utc>,
) -> bool {
    catalog.is_none_or(|data| now - data.fetched_at > max_age)
}

/// Merge `new_tags` into `cached`, stamping new entries with `now`.
///
/// Tags that fail to parse are dropped. A tag already in the cache keeps its
/// cached entry.
pub fn merge_catalog(
    cached: Option<&VersionsData>,
    new_tags: &[String],
    now: DateTime<Utc>,
) -> VersionsData {
    let mut by_tag: HashMap<String, Version> = cached
        .map(|data| data.versions().map(|v| (v.tag.clone(), v.clone())).collect())
        .unwrap_or_default();

    for tag in new_tags {
        if by_tag.contains_key(tag) {
            continue;
        }
        match parse_version(tag) {
            Ok(mut version) => {
                version.fetched_at = Some(now);
                by_tag.insert(tag.clone(), version);
            }
            Err(e) => debug!("Skipping tag: {}", e),
        }
    }

    VersionsData {
        fetched_at: now,
        groups: group_and_sort(by_tag.into_values()),
    }
}

/// Load the cached catalog, fetch new tags, merge and save.
///
/// Fails only when the cache cannot be read or the fetch filter is invalid.
/// Partial fetches are merged and saved; the fetch error is reported in the
/// outcome and the catalog keeps its previous `fetched_at` (the Unix epoch
/// when there was none), so [`should_update`] still asks for a refresh. A
/// failed save is logged and the merged catalog is still returned.
pub async fn refresh_catalog<S, R>(
    storer: &S,
    registry: &R,
    options: &FetchOptions,
) -> Result<RefreshOutcome, RefreshError>
where
    S: CatalogStorer + ?Sized,
    R: TagRegistry + ?Sized,
{
    let cached = storer.load_catalog()?;
    let existing = existing_tags(cached.as_ref());
    debug!("{} tags already cached", existing.len());

    let fetched = fetch_tags(registry, &existing, options).await?;
    if let Some(e) = &fetched.error {
        warn!(
            "Error occurred while fetching tags: {}. Continuing with {} tags that were successfully fetched.",
            e,
            fetched.tags.len()
        );
    }

    let before = existing.len();
    let mut catalog = merge_catalog(cached.as_ref(), &fetched.tags, Utc::now());
    let added = catalog.len().saturating_sub(before);

    // `fetched_at` only advances on a complete refresh
    if fetched.error.is_some() {
        catalog.fetched_at = cached
            .as_ref()
            .map_or(DateTime::<Utc>::UNIX_EPOCH, |data| data.fetched_at);
    }

    match storer.save_catalog(&catalog) {
        Ok(()) => info!("Saved catalog with {} versions ({} new)", catalog.len(), added),
        Err(e) => error!("Failed to save versions cache: {}", e),
    }

    Ok(RefreshOutcome {
        catalog,
        added,
        fetch_error: fetched.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::error::RegistryError;
    use crate::version::registry::{MockTagRegistry, TagPage};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn stamped(tag: &str, secs: i64) -> Version {
        let mut version = parse_version(tag).unwrap();
        version.fetched_at = Some(at(secs));
        version
    }

    fn cached(fetched_at: i64, versions: Vec<Version>) -> VersionsData {
        VersionsData {
            fetched_at: at(fetched_at),
            groups: group_and_sort(versions),
        }
    }

    fn strings(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    fn all_tags(data: &VersionsData) -> Vec<&str> {
        data.versions().map(|v| v.tag.as_str()).collect()
    }

    #[test]
    fn existing_tags_collects_every_cached_tag() {
        let data = cached(0, vec![stamped("go1.21.0", 0), stamped("go1.22rc1", 0)]);

        let tags = existing_tags(Some(&data));

        assert_eq!(tags.len(), 2);
        assert!(tags.contains("go1.21.0"));
        assert!(tags.contains("go1.22rc1"));
        assert!(existing_tags(None).is_empty());
    }

    #[test]
    fn should_update_when_cache_missing_or_stale() {
        let data = cached(1_000, vec![]);
        let day = Duration::hours(24);

        assert!(should_update(None, day, at(1_000)));
        assert!(!should_update(Some(&data), day, at(1_000 + 3_600)));
        assert!(should_update(Some(&data), day, at(1_000 + 86_401)));
    }

    #[test]
    fn merge_catalog_groups_new_tags_in_version_order() {
        let merged = merge_catalog(
            None,
            &strings(&["go1.22.1", "go1.22rc1", "go1.21.0", "go1.22.0"]),
            at(500),
        );

        let keys: Vec<_> = merged.groups.iter().map(|g| g.major_minor.as_str()).collect();
        assert_eq!(keys, vec!["1.21", "1.22"]);
        assert_eq!(
            all_tags(&merged),
            vec!["go1.21.0", "go1.22rc1", "go1.22.0", "go1.22.1"]
        );
        assert_eq!(merged.fetched_at, at(500));
        assert!(merged.versions().all(|v| v.fetched_at == Some(at(500))));
    }

    #[test]
    fn merge_catalog_keeps_cached_entries_and_deduplicates_by_tag() {
        let previous = cached(100, vec![stamped("go1.21.0", 100), stamped("go1.22.0", 100)]);

        let merged = merge_catalog(
            Some(&previous),
            &strings(&["go1.22.1", "go1.22.0", "go1.22.1", "not-a-version"]),
            at(900),
        );

        assert_eq!(all_tags(&merged), vec!["go1.21.0", "go1.22.0", "go1.22.1"]);
        let stamps: Vec<_> = merged.versions().map(|v| v.fetched_at).collect();
        assert_eq!(stamps, vec![Some(at(100)), Some(at(100)), Some(at(900))]);
        assert_eq!(merged.fetched_at, at(900));
    }

    #[tokio::test]
    async fn refresh_catalog_merges_fetched_tags_and_saves() {
        let mut storer = MockCatalogStorer::new();
        storer
            .expect_load_catalog()
            .times(1)
            .returning(|| Ok(Some(cached(100, vec![stamped("go1.21.0", 100)]))));
        storer
            .expect_save_catalog()
            .withf(|data| data.len() == 3)
            .times(1)
            .returning(|_| Ok(()));

        let mut registry = MockTagRegistry::new();
        registry
            .expect_fetch_tag_page()
            .withf(|page, _| *page == 1)
            .times(1)
            .returning(|_, _| {
                Ok(TagPage::new(
                    strings(&["go1.22.0", "go1.22rc1", "go1.21.0"]),
                    false,
                ))
            });

        let outcome = refresh_catalog(&storer, &registry, &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.added, 2);
        assert!(outcome.fetch_error.is_none());
        assert_eq!(
            all_tags(&outcome.catalog),
            vec!["go1.21.0", "go1.22rc1", "go1.22.0"]
        );
    }

    #[tokio::test]
    async fn refresh_catalog_saves_partial_result_and_reports_fetch_error() {
        let mut storer = MockCatalogStorer::new();
        storer.expect_load_catalog().returning(|| Ok(None));
        storer
            .expect_save_catalog()
            .withf(|data| data.len() == 1)
            .times(1)
            .returning(|_| Ok(()));

        let mut registry = MockTagRegistry::new();
        registry
            .expect_fetch_tag_page()
            .withf(|page, _| *page == 1)
            .returning(|_, _| Ok(TagPage::new(strings(&["go1.23.0"]), true)));
        registry
            .expect_fetch_tag_page()
            .withf(|page, _| *page == 2)
            .returning(|_, _| {
                Err(RegistryError::RateLimited {
                    retry_after_secs: None,
                })
            });

        let outcome = refresh_catalog(&storer, &registry, &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(all_tags(&outcome.catalog), vec!["go1.23.0"]);
        assert!(matches!(
            outcome.fetch_error,
            Some(FetchError::RateLimited { .. })
        ));
        assert_eq!(outcome.catalog.fetched_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn refresh_catalog_keeps_previous_stamp_when_fetch_fails() {
        let mut storer = MockCatalogStorer::new();
        storer
            .expect_load_catalog()
            .returning(|| Ok(Some(cached(100, vec![stamped("go1.21.0", 100)]))));
        storer
            .expect_save_catalog()
            .withf(|data| data.fetched_at == at(100))
            .times(1)
            .returning(|_| Ok(()));

        let mut registry = MockTagRegistry::new();
        registry
            .expect_fetch_tag_page()
            .withf(|page, _| *page == 1)
            .times(1)
            .returning(|_, _| {
                Err(RegistryError::RateLimited {
                    retry_after_secs: None,
                })
            });

        let outcome = refresh_catalog(&storer, &registry, &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.added, 0);
        assert!(outcome.fetch_error.is_some());
        assert_eq!(outcome.catalog.fetched_at, at(100));
        assert!(should_update(
            Some(&outcome.catalog),
            Duration::hours(24),
            Utc::now()
        ));
    }

    #[tokio::test]
    async fn refresh_catalog_advances_stamp_after_complete_fetch() {
        let mut storer = MockCatalogStorer::new();
        storer
            .expect_load_catalog()
            .returning(|| Ok(Some(cached(100, vec![stamped("go1.21.0", 100)]))));
        storer.expect_save_catalog().times(1).returning(|_| Ok(()));

        let mut registry = MockTagRegistry::new();
        registry
            .expect_fetch_tag_page()
            .times(1)
            .returning(|_, _| Ok(TagPage::new(strings(&["go1.21.0"]), false)));

        let outcome = refresh_catalog(&storer, &registry, &FetchOptions::default())
            .await
            .unwrap();

        assert!(outcome.catalog.fetched_at > at(100));
        assert!(!should_update(
            Some(&outcome.catalog),
            Duration::hours(24),
            Utc::now()
        ));
    }

    #[tokio::test]
    async fn refresh_catalog_returns_catalog_even_when_save_fails() {
        let mut storer = MockCatalogStorer::new();
        storer.expect_load_catalog().returning(|| Ok(None));
        storer
            .expect_save_catalog()
            .times(1)
            .returning(|_| Err(CacheError::LockPoisoned));

        let mut registry = MockTagRegistry::new();
        registry
            .expect_fetch_tag_page()
            .returning(|_, _| Ok(TagPage::new(strings(&["go1.22.0"]), false)));

        let outcome = refresh_catalog(&storer, &registry, &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.added, 1);
    }

    #[tokio::test]
    async fn refresh_catalog_fails_without_saving_on_invalid_filter() {
        let mut storer = MockCatalogStorer::new();
        storer.expect_load_catalog().returning(|| Ok(None));
        storer.expect_save_catalog().times(0);

        let mut registry = MockTagRegistry::new();
        registry.expect_fetch_tag_page().times(0);

        let options = FetchOptions {
            min_version: Some("nope".to_string()),
            ..FetchOptions::default()
        };
        let result = refresh_catalog(&storer, &registry, &options).await;

        assert!(matches!(
            result,
            Err(RefreshError::Fetch(FetchError::InvalidFilterConfiguration { .. }))
        ));
    }

    #[tokio::test]
    async fn refresh_catalog_propagates_load_failure() {
        let mut storer = MockCatalogStorer::new();
        storer
            .expect_load_catalog()
            .returning(|| Err(CacheError::LockPoisoned));
        storer.expect_save_catalog().times(0);

        let mut registry = MockTagRegistry::new();
        registry.expect_fetch_tag_page().times(0);

        let result = refresh_catalog(&storer, &registry, &FetchOptions::default()).await;

        assert!(matches!(
            result,
            Err(RefreshError::Cache(CacheError::LockPoisoned))
        ));
    }
}
