//! Research agent: turns a topic into a LinkedIn post backed by web research.
//!
//! This crate provides:
//! - Web search via Tavily with depth-based query expansion
//! - Page scraping via Firecrawl with bounded concurrency
//! - LLM research synthesis and post writing (Gemini, Anthropic)
//! - Deterministic post validation with feedback-driven regeneration
//! - All-or-nothing export of post, research markdown and run metadata

pub mod ai;
pub mod analysis;
pub mod config;
pub mod cost;
pub mod enrichment;
pub mod errors;
pub mod pipeline;
pub mod search;
pub mod storage;
pub mod types;
pub mod validation;

// Re-export main types
pub use config::{PostStyle, ResearchDepth, Settings};
pub use errors::{PipelineError, PipelineResult, ServiceError, ServiceResult};
pub use pipeline::{Pipeline, RunOutcome, RunState};
pub use storage::Exporter;
pub use types::{DraftPost, ResearchReport, RunMetadata, ScrapedPage, SearchResult};
