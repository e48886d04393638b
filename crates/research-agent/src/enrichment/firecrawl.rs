//! Firecrawl API client for web scraping.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};

use super::{PageContent, ScrapeProvider};

const FIRECRAWL_API_BASE: &str = "https://api.firecrawl.dev/v1";

/// Response from Firecrawl scrape API.
#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

/// Scraped page data.
#[derive(Debug, Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<ScrapeMetadata>,
}

/// Metadata for a scraped page.
#[derive(Debug, Deserialize)]
struct ScrapeMetadata {
    title: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
}

/// Request body for Firecrawl scrape.
#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
    /// Server-side budget in milliseconds.
    timeout: u64,
}

/// Firecrawl API client.
pub struct FirecrawlClient {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FirecrawlClient {
    /// Create a new Firecrawl client.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        // Leave headroom over the server-side budget so Firecrawl can report its own timeout.
        let client = Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            client,
            base_url: FIRECRAWL_API_BASE.to_string(),
            timeout,
        })
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ScrapeProvider for FirecrawlClient {
    async fn fetch(&self, url: &str) -> ServiceResult<PageContent> {
        let request = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: true,
            timeout: self.timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, body));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("Firecrawl response: {e}")))?;

        if !body.success {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: body
                    .error
                    .unwrap_or_else(|| "Firecrawl reported failure".to_string()),
            });
        }

        let data = body
            .data
            .ok_or_else(|| ServiceError::Parse("No data in scrape response".to_string()))?;

        let metadata = data.metadata;
        // The target site's own status, e.g. a paywall 403.
        if let Some(code) = metadata.as_ref().and_then(|m| m.status_code) {
            if code >= 400 {
                return Err(ServiceError::Api {
                    status: code,
                    message: format!("{url} returned {code}"),
                });
            }
        }

        Ok(PageContent {
            title: metadata.and_then(|m| m.title),
            markdown: data.markdown.unwrap_or_default(),
        })
    }
}
