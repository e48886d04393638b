//! Page scraping.
//!
//! Fetches the text of top search hits so synthesis has more than snippets
//! to work with. Each URL stands alone: a failure is recorded on its
//! [`ScrapedPage`](crate::types::ScrapedPage) and never aborts the batch.

mod firecrawl;
mod pages;

use async_trait::async_trait;

use crate::errors::ServiceResult;

pub use firecrawl::FirecrawlClient;
pub use pages::{scrape_all, truncate_content, DEFAULT_MAX_CONTENT_LENGTH};

/// Raw content extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Page title.
    pub title: Option<String>,
    /// Main content as markdown.
    pub markdown: String,
}

/// Capability to extract readable content from a URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    /// Fetch the main content of `url`.
    async fn fetch(&self, url: &str) -> ServiceResult<PageContent>;
}
