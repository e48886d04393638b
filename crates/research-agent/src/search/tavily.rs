//! Tavily API client for web search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};
use crate::types::SearchResult;

use super::SearchProvider;

const TAVILY_API_BASE: &str = "https://api.tavily.com";

/// Tavily search depth
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum SearchDepth {
    Advanced,
}

/// Tavily API request
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: usize,
}

/// Tavily API response
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Individual search result from Tavily
#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

/// Tavily API client.
pub struct TavilyClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl TavilyClient {
    /// Create a new Tavily client.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key: api_key.into(),
            client,
            base_url: TAVILY_API_BASE.to_string(),
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
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> ServiceResult<Vec<SearchResult>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: SearchDepth::Advanced,
            max_results,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status, body));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(format!("Tavily response: {e}")))?;

        let mut hits = body.results;
        // Tavily mostly returns score order already; make it explicit.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        let results: Vec<SearchResult> = hits
            .into_iter()
            .take(max_results)
            .enumerate()
            .map(|(i, r)| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.content,
                rank: i + 1,
            })
            .collect();

        tracing::debug!(query, results = results.len(), "Tavily search complete");
        Ok(results)
    }
}
