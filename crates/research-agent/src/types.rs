//! Data passed between pipeline stages.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::TokenUsage;
use crate::config::ResearchDepth;

/// One ranked web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Short excerpt returned by the search service.
    pub snippet: String,
    /// 1-based rank.
    pub rank: usize,
}

/// Outcome of scraping one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// URL that was requested.
    pub url: String,
    /// Page title, if the scraper found one.
    pub title: Option<String>,
    /// Extracted text (empty on failure).
    pub text: String,
    /// Whether extraction succeeded.
    pub success: bool,
    /// Why extraction failed.
    pub error: Option<String>,
}

impl ScrapedPage {
    /// A successful scrape.
    pub fn ok(url: impl Into<String>, title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title,
            text: text.into(),
            success: true,
            error: None,
        }
    }

    /// A failed scrape.
    pub fn failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            text: String::new(),
            success: false,
            error: Some(reason.into()),
        }
    }
}

/// A single research finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFinding {
    /// The insight itself.
    pub finding: String,
    /// Where it came from.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Why it matters for the audience.
    #[serde(default)]
    pub relevance: Option<String>,
}

/// Synthesized research for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// Topic researched.
    pub topic: String,
    /// Overview paragraph.
    pub summary: String,
    /// Findings, most important first.
    pub key_findings: Vec<KeyFinding>,
    /// Quantitative data points.
    #[serde(default)]
    pub statistics: Vec<String>,
    /// Expert opinions and quotes.
    #[serde(default)]
    pub expert_insights: Vec<String>,
    /// Emerging trends.
    #[serde(default)]
    pub trends: Vec<String>,
    /// What readers should do with this.
    #[serde(default)]
    pub practical_takeaway: Option<String>,
    /// URLs the report draws on.
    pub source_urls: Vec<String>,
    /// Built from search snippets because no page could be scraped.
    pub snippet_fallback: bool,
    /// Built with no upstream evidence at all.
    pub low_confidence: bool,
}

/// Post draft produced by the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPost {
    /// Publishable text.
    pub text: String,
    /// Unicode scalar count of `text`.
    pub char_count: usize,
    /// Hashtags found in `text`, in order.
    pub hashtags: Vec<String>,
}

/// Validator verdict for one draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// No rule was violated.
    pub passed: bool,
    /// Human-readable violations.
    pub violations: Vec<String>,
    /// Measurements the verdict is based on.
    pub stats: PostStats,
}

/// Measurements of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostStats {
    /// Characters.
    pub length: usize,
    /// Blank-line separated blocks.
    pub paragraphs: usize,
    /// Hashtag occurrences.
    pub hashtags: usize,
}

/// Paths committed by the exporter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFiles {
    /// Post text file.
    pub post: Option<PathBuf>,
    /// Research markdown file.
    pub research: Option<PathBuf>,
    /// Metadata JSON file.
    pub metadata: Option<PathBuf>,
}

impl ExportedFiles {
    /// All committed paths.
    #[must_use]
    pub fn all(&self) -> Vec<&PathBuf> {
        [&self.post, &self.research, &self.metadata]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Facts about one run, written once at export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Topic as given.
    pub topic: String,
    /// Model identifier.
    pub model: String,
    /// Provider that served the model.
    pub provider: String,
    /// Search depth used.
    pub research_depth: ResearchDepth,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Search results kept.
    pub search_results: usize,
    /// URLs attempted.
    pub pages_attempted: usize,
    /// URLs scraped successfully.
    pub pages_scraped: usize,
    /// Writer attempts used.
    pub writing_attempts: u32,
    /// Completed despite upstream failures.
    pub degraded: bool,
    /// What degraded the run.
    pub degraded_reasons: Vec<String>,
    /// Research had no evidence behind it.
    pub low_confidence: bool,
    /// Summed token usage across LLM calls.
    pub token_usage: TokenUsage,
    /// Estimated LLM spend in USD.
    pub estimated_cost_usd: f64,
    /// Final validation verdict.
    pub validation: Option<ValidationResult>,
    /// Exported even though validation failed.
    pub exported_with_violations: bool,
    /// The caller asked for export regardless of validation.
    pub forced_export: bool,
    /// Files committed by this run.
    pub files: ExportedFiles,
}

impl RunMetadata {
    /// Start metadata for a new run.
    pub fn new(topic: impl Into<String>, model: impl Into<String>, depth: ResearchDepth) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            model: model.into(),
            provider: String::new(),
            research_depth: depth,
            started_at: Utc::now(),
            finished_at: None,
            search_results: 0,
            pages_attempted: 0,
            pages_scraped: 0,
            writing_attempts: 0,
            degraded: false,
            degraded_reasons: Vec::new(),
            low_confidence: false,
            token_usage: TokenUsage::default(),
            estimated_cost_usd: 0.0,
            validation: None,
            exported_with_violations: false,
            forced_export: false,
            files: ExportedFiles::default(),
        }
    }

    /// Record a non-fatal upstream failure.
    pub fn degrade(&mut self, reason: impl Into<String>) {
        self.degraded = true;
        self.degraded_reasons.push(reason.into());
    }
}
