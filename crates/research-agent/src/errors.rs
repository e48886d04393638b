//! Error types for upstream services and pipeline stages.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::RunState;

/// Errors raised by a single call to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Call exceeded its time budget.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Service asked us to slow down.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Response body could not be interpreted.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Credentials or endpoint are missing.
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    /// Template rendering failed.
    #[error("Prompt rendering failed: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl ServiceError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::Parse(_) | Self::NotConfigured(_) | Self::Template(_) => false,
        }
    }

    /// Build an error from a non-success HTTP status and its body.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited(body)
        } else {
            Self::Api {
                status: status.as_u16(),
                message: body,
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Result alias for upstream service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that end, or degrade, a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Topic failed input checks.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Search service failed after retries. Non-fatal; the run continues without results.
    #[error("Search unavailable for query '{query}': {source}")]
    SearchUnavailable {
        query: String,
        #[source]
        source: ServiceError,
    },

    /// A single URL could not be scraped. Non-fatal.
    #[error("Scrape failed for {url}: {reason}")]
    ScrapeFailed { url: String, reason: String },

    /// Research synthesis failed after retries.
    #[error("Research synthesis failed: {0}")]
    SynthesisFailed(#[source] ServiceError),

    /// Post writing failed after retries.
    #[error("Post writing failed: {0}")]
    WritingFailed(#[source] ServiceError),

    /// Draft still violates constraints after the regeneration budget.
    #[error("Validation failed after {attempts} attempt(s): {}", .violations.join("; "))]
    ValidationFailed {
        attempts: u32,
        violations: Vec<String>,
    },

    /// Output group could not be committed.
    #[error("Export failed: {reason} (files left written: {})", .written.len())]
    ExportFailed {
        reason: String,
        /// Final paths that remain on disk after rollback.
        written: Vec<PathBuf>,
    },

    /// Stage or run exceeded its time budget.
    #[error("Timed out during {stage} after {secs}s")]
    Timeout { stage: RunState, secs: u64 },

    /// Settings are invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Stage the error originated in.
    #[must_use]
    pub fn stage(&self) -> RunState {
        match self {
            Self::InvalidTopic(_) | Self::Config(_) => RunState::Init,
            Self::SearchUnavailable { .. } => RunState::Searching,
            Self::ScrapeFailed { .. } => RunState::Scraping,
            Self::SynthesisFailed(_) => RunState::Synthesizing,
            Self::WritingFailed(_) => RunState::Writing,
            Self::ValidationFailed { .. } => RunState::Validating,
            Self::ExportFailed { .. } => RunState::Exporting,
            Self::Timeout { stage, .. } => *stage,
        }
    }

    /// Whether the run can continue past this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::SearchUnavailable { .. } | Self::ScrapeFailed { .. }
        )
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
