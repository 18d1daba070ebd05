//! Registry trait for listing release tags page by page

#[cfg(test)]
use mockall::automock;

use crate::version::error::RegistryError;

/// One page of a tag listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPage {
    /// Tag names in the order the remote returned them
    pub names: Vec<String>,
    /// Whether the remote reported another page after this one
    pub has_next: bool,
}

impl TagPage {
    pub fn new(names: Vec<String>, has_next: bool) -> Self {
        Self { names, has_next }
    }
}

/// Trait for fetching tag names from a paginated remote listing
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait TagRegistry: Send + Sync {
    /// Fetches a single page of tag names
    ///
    /// # Arguments
    /// * `page` - 1-based page number
    /// * `per_page` - Page size
    ///
    /// # Returns
    /// * `Ok(TagPage)` - Tag names of the page plus the "has more" indicator
    /// * `Err(RegistryError)` - Classified failure (rate limit, abuse detection, transport)
    async fn fetch_tag_page(&self, page: u32, per_page: u32) -> Result<TagPage, RegistryError>;
}
