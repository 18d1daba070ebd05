//! GitHub Tags API registry implementation

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{DEFAULT_GITHUB_BASE_URL, GO_REPO_NAME, GO_REPO_OWNER};
use crate::version::error::RegistryError;
use crate::version::registry::{TagPage, TagRegistry};

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Response item from GitHub Tags API
#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Error body returned by GitHub on 4xx responses
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    documentation_url: String,
}

impl ErrorBody {
    fn is_secondary_rate_limit(&self) -> bool {
        self.message.to_lowercase().contains("secondary rate limit")
            || self.message.to_lowercase().contains("abuse")
            || self.documentation_url.contains("secondary-rate-limits")
    }
}

/// Registry implementation listing tags of a GitHub repository
pub struct GitHubTagRegistry {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl GitHubTagRegistry {
    /// Creates a registry for golang/go at `base_url`, authenticated when `token` is set
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("goenv/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            owner: GO_REPO_OWNER.to_string(),
            repo: GO_REPO_NAME.to_string(),
            token,
        }
    }

    pub fn with_repository(mut self, owner: &str, repo: &str) -> Self {
        self.owner = owner.to_string();
        self.repo = repo.to_string();
        self
    }

    fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &str) -> RegistryError {
        let error_body: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let retry_after_secs = header_u64(headers, RETRY_AFTER.as_str());

        let throttling_status =
            status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS;

        if throttling_status && error_body.is_secondary_rate_limit() {
            return RegistryError::AbuseDetected { retry_after_secs };
        }

        let exhausted = header_u64(headers, RATE_LIMIT_REMAINING) == Some(0);
        if (throttling_status && exhausted) || status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after_secs.or_else(|| {
                header_u64(headers, RATE_LIMIT_RESET)
                    .and_then(|reset| i64::try_from(reset).ok())
                    .map(|reset| reset.saturating_sub(Utc::now().timestamp()).max(0) as u64)
            });
            return RegistryError::RateLimited { retry_after_secs };
        }

        RegistryError::Status(status.as_u16())
    }
}

impl Default for GitHubTagRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_GITHUB_BASE_URL, None)
    }
}

#[async_trait::async_trait]
impl TagRegistry for GitHubTagRegistry {
    async fn fetch_tag_page(&self, page: u32, per_page: u32) -> Result<TagPage, RegistryError> {
        let url = format!(
            "{}/repos/{}/{}/tags?per_page={}&page={}",
            self.base_url, self.owner, self.repo, per_page, page
        );

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(Self::classify_failure(status, &headers, &body));
        }

        let has_next = has_next_page(response.headers());

        let tags: Vec<Tag> = response.json().await.map_err(|e| {
            warn!("Failed to parse GitHub tags response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        debug!("Page {} returned {} tags (next: {})", page, tags.len(), has_next);

        Ok(TagPage::new(
            tags.into_iter().map(|t| t.name).collect(),
            has_next,
        ))
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Whether a `Link` header advertises a `rel="next"` page
fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|link| {
            link.split(';')
                .skip(1)
                .any(|param| matches!(param.trim(), r#"rel="next""# | "rel=next"))
        })
}
