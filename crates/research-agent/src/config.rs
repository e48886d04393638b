//! Run settings sourced from the environment.
//!
//! Settings are read once at startup (after loading an optional `.env` file)
//! and handed to the pipeline by reference. Nothing downstream reads the
//! environment again.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};

/// Default LLM model.
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";

/// Default sampling temperature.
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.7;

/// Default completion token cap.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Default number of search results kept per run.
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 5;

/// Default number of pages scraped per run.
pub const DEFAULT_MAX_SCRAPE_PAGES: usize = 3;

/// Default post character ceiling.
pub const DEFAULT_MAX_POST_CHARS: usize = 3000;

/// Default post character floor.
pub const DEFAULT_MIN_POST_CHARS: usize = 100;

/// Default hashtag count.
pub const DEFAULT_NUM_HASHTAGS: usize = 5;

/// Default writing tone.
pub const DEFAULT_TONE: &str = "professional but conversational";

/// Default retries per external call (attempts = retries + 1).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default post regenerations after a failed validation.
pub const DEFAULT_MAX_VALIDATION_RETRIES: u32 = 2;

/// Default scrape fan-out.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Default per-call timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default per-call timeout for LLM completions in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Default whole-run budget in seconds.
pub const DEFAULT_MAX_EXECUTION_SECS: u64 = 300;

/// Keys a real run cannot do without.
pub const REQUIRED_KEYS: &[&str] = &["GOOGLE_API_KEY", "TAVILY_API_KEY", "FIRECRAWL_API_KEY"];

/// How much searching a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    /// One broad query.
    Quick,
    /// Broad query plus a statistics query.
    Standard,
    /// Broad, statistics and expert-opinion queries.
    #[default]
    Comprehensive,
}

impl ResearchDepth {
    /// Search queries issued for a topic at this depth.
    #[must_use]
    pub fn queries(self, topic: &str) -> Vec<String> {
        let mut queries = vec![topic.to_string()];
        if matches!(self, Self::Standard | Self::Comprehensive) {
            queries.push(format!("{topic} statistics data"));
        }
        if self == Self::Comprehensive {
            queries.push(format!("{topic} expert insights trends"));
        }
        queries
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl FromStr for ResearchDepth {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "comprehensive" => Ok(Self::Comprehensive),
            other => Err(PipelineError::Config(format!(
                "RESEARCH_DEPTH must be quick, standard or comprehensive (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Style constraints handed to the writer and validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStyle {
    /// Voice the post is written in.
    pub tone: String,
    /// Upper bound on post characters.
    pub max_chars: usize,
    /// Lower bound on post characters.
    pub min_chars: usize,
    /// Whether hashtags are expected at all.
    pub include_hashtags: bool,
    /// Target (and maximum) hashtag count.
    pub num_hashtags: usize,
}

impl Default for PostStyle {
    fn default() -> Self {
        Self {
            tone: DEFAULT_TONE.to_string(),
            max_chars: DEFAULT_MAX_POST_CHARS,
            min_chars: DEFAULT_MIN_POST_CHARS,
            include_hashtags: true,
            num_hashtags: DEFAULT_NUM_HASHTAGS,
        }
    }
}

/// Immutable per-process settings.
#[derive(Clone)]
pub struct Settings {
    /// Gemini API key.
    pub google_api_key: Option<String>,
    /// Tavily search API key.
    pub tavily_api_key: Option<String>,
    /// Firecrawl scrape API key.
    pub firecrawl_api_key: Option<String>,
    /// Anthropic API key, enables Claude models.
    pub anthropic_api_key: Option<String>,

    /// Model identifier.
    pub llm_model: String,
    /// Sampling temperature.
    pub llm_temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,

    /// Search results kept after merging queries.
    pub max_search_results: usize,
    /// Top URLs handed to the scraper.
    pub max_scrape_pages: usize,
    /// Number of search queries.
    pub research_depth: ResearchDepth,

    /// Post constraints.
    pub style: PostStyle,

    /// Retries per external call.
    pub max_retries: u32,
    /// Regenerations after validation failure.
    pub max_validation_retries: u32,
    /// Export the best draft when regenerations run out.
    pub export_on_validation_failure: bool,
    /// Concurrent search or scrape calls.
    pub max_concurrency: usize,
    /// Budget per search or scrape call.
    pub request_timeout: Duration,
    /// Budget per LLM call.
    pub llm_timeout: Duration,
    /// Budget per run.
    pub max_execution_time: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            google_api_key: None,
            tavily_api_key: None,
            firecrawl_api_key: None,
            anthropic_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_temperature: DEFAULT_LLM_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            max_scrape_pages: DEFAULT_MAX_SCRAPE_PAGES,
            research_depth: ResearchDepth::default(),
            style: PostStyle::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            max_validation_retries: DEFAULT_MAX_VALIDATION_RETRIES,
            export_on_validation_failure: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            max_execution_time: Duration::from_secs(DEFAULT_MAX_EXECUTION_SECS),
        }
    }
}

// Keys are redacted so settings can be logged.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(set: bool) -> &'static str {
            if set {
                "<set>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("Settings")
            .field("google_api_key", &redact(self.google_api_key.is_some()))
            .field("tavily_api_key", &redact(self.tavily_api_key.is_some()))
            .field("firecrawl_api_key", &redact(self.firecrawl_api_key.is_some()))
            .field("anthropic_api_key", &redact(self.anthropic_api_key.is_some()))
            .field("llm_model", &self.llm_model)
            .field("llm_temperature", &self.llm_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_search_results", &self.max_search_results)
            .field("max_scrape_pages", &self.max_scrape_pages)
            .field("research_depth", &self.research_depth)
            .field("style", &self.style)
            .field("max_retries", &self.max_retries)
            .field("max_validation_retries", &self.max_validation_retries)
            .field(
                "export_on_validation_failure",
                &self.export_on_validation_failure,
            )
            .field("max_concurrency", &self.max_concurrency)
            .field("request_timeout", &self.request_timeout)
            .field("llm_timeout", &self.llm_timeout)
            .field("max_execution_time", &self.max_execution_time)
            .finish()
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    ///
    /// # Optional Environment Variables
    /// - `LLM_MODEL` (default: gemini-1.5-flash)
    /// - `MAX_SEARCH_RESULTS` (default: 5), `MAX_SCRAPE_PAGES` (default: 3)
    /// - `RESEARCH_DEPTH`: quick | standard | comprehensive
    /// - `LINKEDIN_MAX_CHARS` (default: 3000), `NUM_HASHTAGS` (default: 5)
    /// - `MAX_EXECUTION_TIME_SECS` (default: 300)
    pub fn from_env() -> PipelineResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
            lookup(name).and_then(|v| v.trim().parse().ok())
        }

        let key = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let flag = |name: &str, default: bool| {
            lookup(name)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        let research_depth = match lookup("RESEARCH_DEPTH") {
            Some(v) => v.parse()?,
            None => ResearchDepth::default(),
        };

        let max_concurrency: usize =
            parsed(&lookup, "MAX_CONCURRENCY").unwrap_or(DEFAULT_MAX_CONCURRENCY);

        let settings = Self {
            google_api_key: key("GOOGLE_API_KEY"),
            tavily_api_key: key("TAVILY_API_KEY"),
            firecrawl_api_key: key("FIRECRAWL_API_KEY"),
            anthropic_api_key: key("ANTHROPIC_API_KEY"),
            llm_model: key("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_temperature: parsed(&lookup, "LLM_TEMPERATURE").unwrap_or(DEFAULT_LLM_TEMPERATURE),
            max_tokens: parsed(&lookup, "MAX_TOKENS").unwrap_or(DEFAULT_MAX_TOKENS),
            max_search_results: parsed(&lookup, "MAX_SEARCH_RESULTS")
                .unwrap_or(DEFAULT_MAX_SEARCH_RESULTS),
            max_scrape_pages: parsed(&lookup, "MAX_SCRAPE_PAGES")
                .unwrap_or(DEFAULT_MAX_SCRAPE_PAGES),
            research_depth,
            style: PostStyle {
                tone: key("POST_TONE").unwrap_or_else(|| DEFAULT_TONE.to_string()),
                max_chars: parsed(&lookup, "LINKEDIN_MAX_CHARS")
                    .unwrap_or(DEFAULT_MAX_POST_CHARS),
                min_chars: parsed(&lookup, "LINKEDIN_MIN_CHARS")
                    .unwrap_or(DEFAULT_MIN_POST_CHARS),
                include_hashtags: flag("INCLUDE_HASHTAGS", true),
                num_hashtags: parsed(&lookup, "NUM_HASHTAGS").unwrap_or(DEFAULT_NUM_HASHTAGS),
            },
            max_retries: parsed(&lookup, "MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES),
            max_validation_retries: parsed(&lookup, "MAX_VALIDATION_RETRIES")
                .unwrap_or(DEFAULT_MAX_VALIDATION_RETRIES),
            export_on_validation_failure: flag("EXPORT_ON_VALIDATION_FAILURE", true),
            max_concurrency: max_concurrency.max(1),
            request_timeout: Duration::from_secs(
                parsed(&lookup, "REQUEST_TIMEOUT_SECS").unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            llm_timeout: Duration::from_secs(
                parsed(&lookup, "LLM_TIMEOUT_SECS").unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
            max_execution_time: Duration::from_secs(
                parsed(&lookup, "MAX_EXECUTION_TIME_SECS").unwrap_or(DEFAULT_MAX_EXECUTION_SECS),
            ),
        };

        settings.check()?;
        Ok(settings)
    }

    /// Reject combinations no run could satisfy.
    fn check(&self) -> PipelineResult<()> {
        if self.style.min_chars > self.style.max_chars {
            return Err(PipelineError::Config(format!(
                "LINKEDIN_MIN_CHARS ({}) exceeds LINKEDIN_MAX_CHARS ({})",
                self.style.min_chars, self.style.max_chars
            )));
        }
        if self.style.include_hashtags && self.style.num_hashtags == 0 {
            return Err(PipelineError::Config(
                "NUM_HASHTAGS must be at least 1 when INCLUDE_HASHTAGS is enabled".to_string(),
            ));
        }
        if self.max_search_results == 0 {
            return Err(PipelineError::Config(
                "MAX_SEARCH_RESULTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Required credential variables that are absent.
    #[must_use]
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .iter()
            .zip([
                &self.google_api_key,
                &self.tavily_api_key,
                &self.firecrawl_api_key,
            ])
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect()
    }
}
