use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Fetch-related constants
// =============================================================================

/// Minimum version fetched when no filter is supplied
pub const DEFAULT_MIN_VERSION: &str = "go1.10";

/// Deadline covering a whole multi-page tag retrieval (5 minutes)
pub const OVERALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Number of tags requested per page
pub const PAGE_SIZE: u32 = 100;

/// Default refresh interval in milliseconds (24 hours)
pub const DEFAULT_REFRESH_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

pub const DEFAULT_GITHUB_BASE_URL: &str = "https://api.github.com";
pub const GO_REPO_OWNER: &str = "golang";
pub const GO_REPO_NAME: &str = "go";

/// Environment variable holding an optional GitHub token
pub const TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";

/// Environment variable overriding the data directory
pub const ROOT_ENV: &str = "GOENV_ROOT";

/// User settings, read from `config.json` in the data directory
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub cache: CacheConfig,
    pub github: GitHubConfig,
    pub fetch: FetchConfig,
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Cache refresh interval in milliseconds
    pub refresh_interval: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

/// Remote repository configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GitHubConfig {
    pub base_url: String,
    pub owner: String,
    pub repo: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GITHUB_BASE_URL.to_string(),
            owner: GO_REPO_OWNER.to_string(),
            repo: GO_REPO_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    /// Overall deadline of one retrieval in seconds
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: OVERALL_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!("failed to read {}: {}", path.display(), e)),
        }
    }
}

/// Returns the data directory for goenv.
/// Uses $GOENV_ROOT if set, otherwise falls back to ~/.goenv,
/// or ./.goenv if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var(ROOT_ENV).ok(), dirs::home_dir())
}

/// Returns the path to the catalog database.
pub fn db_path() -> PathBuf {
    data_dir().join("versions.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("goenv.log")
}

/// Returns the path to the optional settings file.
pub fn settings_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Reads the GitHub token from the process environment.
pub fn github_token() -> Option<String> {
    token_from_env(std::env::var(TOKEN_ENV).ok())
}

fn token_from_env(value: Option<String>) -> Option<String> {
    value
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn data_dir_with_env(goenv_root: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    goenv_root
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".goenv")))
        .unwrap_or_else(|| PathBuf::from(".goenv"))
}
