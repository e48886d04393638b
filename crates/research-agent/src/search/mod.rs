//! Web search.
//!
//! The pipeline talks to search through [`SearchProvider`] so tests can swap
//! in a deterministic fake.

mod tavily;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::ServiceResult;
use crate::types::SearchResult;

pub use tavily::TavilyClient;

/// Capability to run a web search.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return up to `max_results` hits for `query`, ranked 1..k.
    async fn search(&self, query: &str, max_results: usize) -> ServiceResult<Vec<SearchResult>>;
}

/// Merge per-query hit lists, dropping repeated URLs and re-ranking.
///
/// Earlier lists win ties, so the broad query's hits lead.
pub fn merge_results(batches: Vec<Vec<SearchResult>>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut merged: Vec<SearchResult> = batches
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(normalize_url(&r.url)))
        .take(limit)
        .collect();

    for (i, result) in merged.iter_mut().enumerate() {
        result.rank = i + 1;
    }
    merged
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}
