//! Bounded concurrent scraping.

use futures::stream::{self, StreamExt};

use crate::pipeline::RetryConfig;
use crate::types::ScrapedPage;

use super::ScrapeProvider;

/// Per-page character cap handed to the LLM.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 8_000;

/// Scrape every URL with at most `concurrency` requests in flight.
///
/// Output order matches `urls`. Failed URLs come back with `success = false`.
pub async fn scrape_all(
    scraper: &dyn ScrapeProvider,
    urls: &[String],
    concurrency: usize,
    retry: &RetryConfig,
    max_content_length: usize,
) -> Vec<ScrapedPage> {
    stream::iter(urls)
        .map(|url| scrape_one(scraper, url, retry, max_content_length))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

async fn scrape_one(
    scraper: &dyn ScrapeProvider,
    url: &str,
    retry: &RetryConfig,
    max_content_length: usize,
) -> ScrapedPage {
    match retry.run("scrape", || scraper.fetch(url)).await {
        Ok(content) if content.markdown.trim().is_empty() => {
            tracing::warn!(url, "Scrape returned no content");
            ScrapedPage::failed(url, "empty page content")
        }
        Ok(content) => {
            tracing::info!(url, chars = content.markdown.len(), "Scraped page");
            let text = truncate_content(&content.markdown, max_content_length);
            ScrapedPage::ok(url, content.title, text)
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "Failed to scrape page");
            ScrapedPage::failed(url, e.to_string())
        }
    }
}

/// Truncate content to `max_length` bytes, preferring a paragraph break.
pub fn truncate_content(content: &str, max_length: usize) -> String {
    if content.len() <= max_length {
        return content.to_string();
    }

    // Largest char boundary that still fits
    let mut safe_end = max_length;
    while !content.is_char_boundary(safe_end) {
        safe_end -= 1;
    }

    // Try to find a paragraph break near the limit
    let truncate_at = match content[..safe_end].rfind("\n\n") {
        Some(i) if i > safe_end / 2 => i,
        _ => safe_end,
    };

    format!("{}...", content[..truncate_at].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{MockScrapeProvider, PageContent};
    use crate::errors::ServiceError;
    use std::time::Duration;

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(1),
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_truncate_short_content_untouched() {
        assert_eq!(truncate_content("short", 100), "short");
    }

    #[test]
    fn test_truncate_prefers_paragraph_break() {
        let content = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let truncated = truncate_content(&content, 100);
        assert_eq!(truncated, format!("{}...", "a".repeat(60)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let content = "é".repeat(100);
        let truncated = truncate_content(&content, 51);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.trim_end_matches("...").chars().count(), 25);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_per_url() {
        let mut scraper = MockScrapeProvider::new();
        scraper.expect_fetch().returning(|url| {
            if url.contains("bad") {
                Err(ServiceError::Api {
                    status: 403,
                    message: "paywall".into(),
                })
            } else {
                Ok(PageContent {
                    title: Some("Good".into()),
                    markdown: "content".into(),
                })
            }
        });

        let urls = vec![
            "https://good.dev/1".to_string(),
            "https://bad.dev".to_string(),
            "https://good.dev/2".to_string(),
        ];
        let pages = scrape_all(&scraper, &urls, 2, &quick_retry(), 1000).await;

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].url, "https://good.dev/1");
        assert!(pages[0].success);
        assert!(!pages[1].success);
        assert!(pages[1].error.as_deref().unwrap().contains("paywall"));
        assert!(pages[2].success);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let mut scraper = MockScrapeProvider::new();
        let mut seq = mockall::Sequence::new();
        scraper
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ServiceError::Timeout(30)));
        scraper
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(PageContent {
                    title: None,
                    markdown: "second time lucky".into(),
                })
            });

        let pages = scrape_all(
            &scraper,
            &["https://flaky.dev".to_string()],
            1,
            &quick_retry(),
            1000,
        )
        .await;

        assert!(pages[0].success);
        assert_eq!(pages[0].text, "second time lucky");
    }

    #[tokio::test]
    async fn test_empty_content_is_failure() {
        let mut scraper = MockScrapeProvider::new();
        scraper.expect_fetch().returning(|_| {
            Ok(PageContent {
                title: None,
                markdown: "   ".into(),
            })
        });

        let pages = scrape_all(&scraper, &["https://blank.dev".to_string()], 1, &quick_retry(), 1000).await;
        assert!(!pages[0].success);
    }
}
