use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version tag format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Invalid timestamp in cache: {0}")]
    InvalidTimestamp(i64),
}

/// Failure reported by a [`TagRegistry`](crate::version::registry::TagRegistry)
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Abuse detection triggered: retry after {retry_after_secs:?} seconds")]
    AbuseDetected { retry_after_secs: Option<u64> },

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Why a tag retrieval pass stopped early.
///
/// Everything except `InvalidFilterConfiguration` is returned together with
/// the tags collected before the failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid min version {value}: {source}")]
    InvalidFilterConfiguration {
        value: String,
        #[source]
        source: VersionError,
    },

    #[error("GitHub API rate limit exceeded. Please wait or set GITHUB_ACCESS_TOKEN for higher limits")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("GitHub API abuse rate limit exceeded. Please wait before retrying")]
    AbuseDetected { retry_after_secs: Option<u64> },

    #[error("failed to fetch tags at page {page}: {source}")]
    TransportOrServer {
        page: u32,
        #[source]
        source: RegistryError,
    },

    #[error("fetch tags timeout after {after:?}")]
    Timeout { after: Duration },
}

impl FetchError {
    /// Classify a registry failure on `page`
    pub fn from_registry(page: u32, err: RegistryError) -> Self {
        match err {
            RegistryError::RateLimited { retry_after_secs } => {
                FetchError::RateLimited { retry_after_secs }
            }
            RegistryError::AbuseDetected { retry_after_secs } => {
                FetchError::AbuseDetected { retry_after_secs }
            }
            source => FetchError::TransportOrServer { page, source },
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
