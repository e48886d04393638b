//! Research synthesis using an LLM provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ai::{parse_ai_response, AIMessage, AIProvider, GenerateOptions, TokenUsage};
use crate::errors::{ServiceError, ServiceResult};
use crate::types::{KeyFinding, ResearchReport, ScrapedPage, SearchResult};

use super::prompts::{PromptManager, RESEARCH_SYSTEM_PROMPT, RESEARCH_TEMPLATE_NAME};

/// Report plus what it cost to produce.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// The report.
    pub report: ResearchReport,
    /// Tokens spent.
    pub usage: TokenUsage,
    /// Provider that served the call.
    pub provider: String,
}

/// Raw response from AI for parsing.
#[derive(Debug, Deserialize)]
struct RawReport {
    summary: String,
    #[serde(default)]
    key_findings: Vec<KeyFinding>,
    #[serde(default)]
    statistics: Vec<String>,
    #[serde(default)]
    expert_insights: Vec<String>,
    #[serde(default)]
    trends: Vec<String>,
    #[serde(default)]
    practical_takeaway: Option<String>,
}

#[derive(Serialize)]
struct PromptPage<'a> {
    url: &'a str,
    title: Option<&'a str>,
    text: &'a str,
}

/// Which evidence a report can stand on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    /// URLs backing the report.
    pub source_urls: Vec<String>,
    /// Only search snippets were available.
    pub snippet_fallback: bool,
    /// Nothing was available.
    pub low_confidence: bool,
}

impl Evidence {
    /// Classify search and scrape output.
    ///
    /// Successful scrapes are the sources. With none, search hits stand in
    /// and the fallback is flagged. With neither, the report is low confidence.
    #[must_use]
    pub fn assess(results: &[SearchResult], pages: &[ScrapedPage]) -> Self {
        let scraped: Vec<String> = pages
            .iter()
            .filter(|p| p.success)
            .map(|p| p.url.clone())
            .collect();

        if !scraped.is_empty() {
            return Self {
                source_urls: scraped,
                snippet_fallback: false,
                low_confidence: false,
            };
        }

        if !results.is_empty() {
            return Self {
                source_urls: results.iter().map(|r| r.url.clone()).collect(),
                snippet_fallback: true,
                low_confidence: false,
            };
        }

        Self {
            source_urls: Vec::new(),
            snippet_fallback: false,
            low_confidence: true,
        }
    }
}

/// Turns search and scrape output into a [`ResearchReport`].
pub struct ResearchSynthesizer {
    provider: Arc<dyn AIProvider>,
    prompts: Arc<PromptManager>,
    model: String,
    options: GenerateOptions,
}

impl ResearchSynthesizer {
    /// Create a new synthesizer.
    pub fn new(
        provider: Arc<dyn AIProvider>,
        prompts: Arc<PromptManager>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            prompts,
            model: model.into(),
            options: GenerateOptions {
                // Research wants facts, not flair.
                temperature: Some(0.3),
                max_tokens: Some(max_tokens),
                json_mode: true,
                ..Default::default()
            },
        }
    }

    /// Build the synthesis prompt.
    pub fn build_prompt(
        &self,
        topic: &str,
        results: &[SearchResult],
        pages: &[ScrapedPage],
        evidence: &Evidence,
    ) -> ServiceResult<String> {
        let pages: Vec<PromptPage<'_>> = pages
            .iter()
            .filter(|p| p.success)
            .map(|p| PromptPage {
                url: &p.url,
                title: p.title.as_deref(),
                text: &p.text,
            })
            .collect();

        let data = serde_json::json!({
            "topic": topic,
            "pages": pages,
            "results": results,
            "snippet_fallback": evidence.snippet_fallback,
            "has_evidence": !evidence.low_confidence,
        });

        self.prompts.render(RESEARCH_TEMPLATE_NAME, &data)
    }

    /// Make one synthesis call.
    ///
    /// Non-JSON output is kept as the summary rather than failing the run.
    pub async fn synthesize(
        &self,
        topic: &str,
        results: &[SearchResult],
        pages: &[ScrapedPage],
    ) -> ServiceResult<Synthesis> {
        let evidence = Evidence::assess(results, pages);
        let prompt = self.build_prompt(topic, results, pages, &evidence)?;

        let messages = vec![
            AIMessage::system(RESEARCH_SYSTEM_PROMPT),
            AIMessage::user(prompt),
        ];

        let response = self
            .provider
            .generate_text(&self.model, &messages, &self.options)
            .await?;

        let raw = match parse_ai_response::<RawReport>(&response) {
            Ok(raw) => raw,
            Err(ServiceError::Parse(reason)) => {
                tracing::warn!(%reason, "Research response was not JSON, keeping raw text");
                RawReport {
                    summary: response.text.trim().to_string(),
                    key_findings: Vec::new(),
                    statistics: Vec::new(),
                    expert_insights: Vec::new(),
                    trends: Vec::new(),
                    practical_takeaway: None,
                }
            }
            Err(e) => return Err(e),
        };

        if raw.summary.trim().is_empty() && raw.key_findings.is_empty() {
            return Err(ServiceError::Parse(
                "Research response had neither summary nor findings".to_string(),
            ));
        }

        tracing::info!(
            topic,
            findings = raw.key_findings.len(),
            sources = evidence.source_urls.len(),
            snippet_fallback = evidence.snippet_fallback,
            low_confidence = evidence.low_confidence,
            "Research synthesized"
        );

        Ok(Synthesis {
            report: ResearchReport {
                topic: topic.to_string(),
                summary: raw.summary,
                key_findings: raw.key_findings,
                statistics: raw.statistics,
                expert_insights: raw.expert_insights,
                trends: raw.trends,
                practical_takeaway: raw.practical_takeaway,
                source_urls: evidence.source_urls,
                snippet_fallback: evidence.snippet_fallback,
                low_confidence: evidence.low_confidence,
            },
            usage: response.usage,
            provider: response.provider,
        })
    }
}
