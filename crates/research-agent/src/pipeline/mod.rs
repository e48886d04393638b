//! Research pipeline - orchestrates the full search-scrape-synthesize-write-export flow.
//!
//! A run walks the [`RunState`] table one stage at a time. Search and scrape
//! failures degrade the run instead of ending it; synthesis, writing and
//! export failures end it in [`RunState::Failed`]. The whole run is bounded by
//! `Settings::max_execution_time`.

mod retry;
mod state;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::ai::{AIProvider, TokenUsage};
use crate::analysis::{PostWriter, PromptManager, ResearchSynthesizer};
use crate::config::Settings;
use crate::cost::estimate_cost;
use crate::enrichment::{scrape_all, ScrapeProvider, DEFAULT_MAX_CONTENT_LENGTH};
use crate::errors::{PipelineError, PipelineResult, ServiceResult};
use crate::search::{merge_results, SearchProvider};
use crate::storage::Exporter;
use crate::types::{
    DraftPost, ExportedFiles, ResearchReport, RunMetadata, ScrapedPage, SearchResult,
    ValidationResult,
};
use crate::validation;

pub use retry::RetryConfig;
pub use state::{RunEvent, RunState};

/// Shortest accepted topic, in characters.
pub const MIN_TOPIC_CHARS: usize = 3;

/// Longest accepted topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 200;

/// Callback invoked on every state change.
pub type ProgressFn = Arc<dyn Fn(RunState) + Send + Sync>;

/// Trim a topic and check its length.
pub fn validate_topic(topic: &str) -> PipelineResult<String> {
    let topic = topic.trim();
    let chars = topic.chars().count();

    if chars < MIN_TOPIC_CHARS {
        return Err(PipelineError::InvalidTopic(format!(
            "topic must be at least {MIN_TOPIC_CHARS} characters"
        )));
    }
    if chars > MAX_TOPIC_CHARS {
        return Err(PipelineError::InvalidTopic(format!(
            "topic must be at most {MAX_TOPIC_CHARS} characters (got {chars})"
        )));
    }
    Ok(topic.to_string())
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final state, always [`RunState::Done`].
    pub state: RunState,
    /// Every state the run passed through, starting at `Init`.
    pub transitions: Vec<RunState>,
    /// Synthesized research.
    pub report: ResearchReport,
    /// Exported draft.
    pub draft: DraftPost,
    /// Verdict on the exported draft.
    pub validation: ValidationResult,
    /// Run metadata as written to disk.
    pub metadata: RunMetadata,
    /// Committed files.
    pub files: ExportedFiles,
    /// Non-fatal problems worth showing the user.
    pub warnings: Vec<String>,
}

/// Holds the current state so it survives a cancelled run.
struct Tracker {
    history: Mutex<Vec<RunState>>,
    progress: Option<ProgressFn>,
}

impl Tracker {
    fn new(progress: Option<ProgressFn>) -> Self {
        Self {
            history: Mutex::new(vec![RunState::Init]),
            progress,
        }
    }

    fn current(&self) -> RunState {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
            .unwrap_or(RunState::Init)
    }

    fn history(&self) -> Vec<RunState> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply(&self, event: RunEvent) -> RunState {
        let (from, to) = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            let from = history.last().copied().unwrap_or(RunState::Init);
            let to = from.on(event);
            if to != from {
                history.push(to);
            }
            (from, to)
        };

        if to != from {
            tracing::debug!(from = %from, to = %to, "State transition");
            if let Some(progress) = &self.progress {
                progress(to);
            }
        }
        to
    }
}

/// Research pipeline orchestrator.
pub struct Pipeline {
    settings: Settings,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn ScrapeProvider>,
    llm: Arc<dyn AIProvider>,
    synthesizer: ResearchSynthesizer,
    writer: PostWriter,
    io_retry: RetryConfig,
    llm_retry: RetryConfig,
    progress: Option<ProgressFn>,
    force_export: bool,
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(
        settings: Settings,
        search: Arc<dyn SearchProvider>,
        scraper: Arc<dyn ScrapeProvider>,
        llm: Arc<dyn AIProvider>,
    ) -> PipelineResult<Self> {
        let prompts = Arc::new(
            PromptManager::new()
                .map_err(|e| PipelineError::Config(format!("invalid prompt template: {e}")))?,
        );

        let synthesizer = ResearchSynthesizer::new(
            llm.clone(),
            prompts.clone(),
            settings.llm_model.clone(),
            settings.max_tokens,
        );
        let writer = PostWriter::new(
            llm.clone(),
            prompts,
            settings.llm_model.clone(),
            settings.llm_temperature,
            settings.max_tokens,
        );

        let io_retry = RetryConfig {
            max_retries: settings.max_retries,
            call_timeout: settings.request_timeout,
            ..RetryConfig::default()
        };
        let llm_retry = RetryConfig {
            max_retries: settings.max_retries,
            call_timeout: settings.llm_timeout,
            ..RetryConfig::default()
        };

        Ok(Self {
            settings,
            search,
            scraper,
            llm,
            synthesizer,
            writer,
            io_retry,
            llm_retry,
            progress: None,
            force_export: false,
        })
    }

    /// Report state changes to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Fn(RunState) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Export the best draft even when validation never passes.
    #[must_use]
    pub fn with_force_export(mut self, force_export: bool) -> Self {
        self.force_export = force_export;
        self
    }

    /// Override retry backoff for every external call.
    #[must_use]
    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        for retry in [&mut self.io_retry, &mut self.llm_retry] {
            retry.initial_delay = initial_delay;
            retry.max_delay = max_delay;
        }
        self
    }

    /// Settings this pipeline runs with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the full pipeline for `topic`, writing into `exporter`'s directory.
    pub async fn run(&self, topic: &str, exporter: &Exporter) -> PipelineResult<RunOutcome> {
        let tracker = Tracker::new(self.progress.clone());
        let budget = self.settings.max_execution_time;

        let result =
            match tokio::time::timeout(budget, self.execute(topic, exporter, &tracker)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    stage: tracker.current(),
                    secs: budget.as_secs(),
                }),
            };

        if let Err(e) = &result {
            let stage = tracker.current();
            tracker.apply(RunEvent::Errored);
            tracing::error!(stage = %stage, error = %e, "Run failed");
        }
        result
    }

    async fn execute(
        &self,
        topic: &str,
        exporter: &Exporter,
        tracker: &Tracker,
    ) -> PipelineResult<RunOutcome> {
        let topic = validate_topic(topic)?;
        let settings = &self.settings;

        let mut metadata = RunMetadata::new(
            topic.clone(),
            settings.llm_model.clone(),
            settings.research_depth,
        );
        metadata.provider = self.llm.name().to_string();
        let mut usage = TokenUsage::default();

        tracing::info!(
            run_id = %metadata.run_id,
            topic = %topic,
            model = %settings.llm_model,
            depth = %settings.research_depth,
            "Starting research run"
        );

        tracker.apply(RunEvent::Completed);
        let results = self.search_stage(&topic, &mut metadata).await;

        tracker.apply(RunEvent::Completed);
        let pages = self.scrape_stage(&results, &mut metadata).await;

        tracker.apply(RunEvent::Completed);
        let synthesis = self
            .llm_retry
            .run("synthesize", || {
                self.synthesizer.synthesize(&topic, &results, &pages)
            })
            .await
            .map_err(PipelineError::SynthesisFailed)?;
        usage.add(synthesis.usage);
        let report = synthesis.report;
        metadata.low_confidence = report.low_confidence;
        if report.low_confidence {
            tracing::warn!("No web evidence available, research is low confidence");
        }

        tracker.apply(RunEvent::Completed);
        let (draft, verdict, attempts) = self.write_stage(&report, tracker, &mut usage).await?;

        let mut warnings = metadata.degraded_reasons.clone();
        if !verdict.passed {
            metadata.exported_with_violations = true;
            metadata.forced_export = self.force_export;
            warnings.extend(
                verdict
                    .violations
                    .iter()
                    .map(|v| format!("Exported despite validation failure: {v}")),
            );
        }

        tracker.apply(RunEvent::Completed);
        metadata.writing_attempts = attempts;
        metadata.token_usage = usage;
        metadata.estimated_cost_usd = estimate_cost(&settings.llm_model, &usage);
        metadata.validation = Some(verdict.clone());
        metadata.finished_at = Some(Utc::now());

        let files = exporter.export(&draft, &report, &mut metadata)?;

        let state = tracker.apply(RunEvent::Completed);
        tracing::info!(
            run_id = %metadata.run_id,
            chars = draft.char_count,
            attempts,
            degraded = metadata.degraded,
            tokens = usage.total_tokens,
            cost_usd = metadata.estimated_cost_usd,
            "Run complete"
        );

        Ok(RunOutcome {
            state,
            transitions: tracker.history(),
            report,
            draft,
            validation: verdict,
            metadata,
            files,
            warnings,
        })
    }

    async fn search_stage(&self, topic: &str, metadata: &mut RunMetadata) -> Vec<SearchResult> {
        let queries = self.settings.research_depth.queries(topic);
        let max_results = self.settings.max_search_results;

        let outcomes: Vec<(&String, ServiceResult<Vec<SearchResult>>)> = stream::iter(&queries)
            .map(|query| async move {
                let result = self
                    .io_retry
                    .run("search", || self.search.search(query, max_results))
                    .await;
                (query, result)
            })
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut batches = Vec::with_capacity(outcomes.len());
        for (query, result) in outcomes {
            match result {
                Ok(hits) => {
                    tracing::debug!(query = %query, hits = hits.len(), "Search returned");
                    batches.push(hits);
                }
                Err(source) => {
                    let err = PipelineError::SearchUnavailable {
                        query: query.clone(),
                        source,
                    };
                    tracing::warn!(error = %err, "Continuing without these search results");
                    metadata.degrade(err.to_string());
                }
            }
        }

        let results = merge_results(batches, max_results);
        metadata.search_results = results.len();
        tracing::info!(
            queries = queries.len(),
            results = results.len(),
            "Search complete"
        );
        results
    }

    async fn scrape_stage(
        &self,
        results: &[SearchResult],
        metadata: &mut RunMetadata,
    ) -> Vec<ScrapedPage> {
        let urls: Vec<String> = results
            .iter()
            .take(self.settings.max_scrape_pages)
            .map(|r| r.url.clone())
            .collect();
        metadata.pages_attempted = urls.len();

        if urls.is_empty() {
            tracing::info!("No URLs to scrape");
            return Vec::new();
        }

        let pages = scrape_all(
            self.scraper.as_ref(),
            &urls,
            self.settings.max_concurrency,
            &self.io_retry,
            DEFAULT_MAX_CONTENT_LENGTH,
        )
        .await;

        for page in pages.iter().filter(|p| !p.success) {
            let err = PipelineError::ScrapeFailed {
                url: page.url.clone(),
                reason: page.error.clone().unwrap_or_default(),
            };
            metadata.degrade(err.to_string());
        }

        metadata.pages_scraped = pages.iter().filter(|p| p.success).count();
        if metadata.pages_scraped == 0 {
            tracing::warn!(
                attempted = urls.len(),
                "All scrapes failed, falling back to search snippets"
            );
        } else {
            tracing::info!(
                scraped = metadata.pages_scraped,
                attempted = urls.len(),
                "Scrape complete"
            );
        }
        pages
    }

    /// Write and validate until a draft passes or the budget is spent.
    ///
    /// Returns the draft to export, its verdict and the attempts used.
    async fn write_stage(
        &self,
        report: &ResearchReport,
        tracker: &Tracker,
        usage: &mut TokenUsage,
    ) -> PipelineResult<(DraftPost, ValidationResult, u32)> {
        let max_attempts = self.settings.max_validation_retries.saturating_add(1);
        let mut attempts = 1u32;

        let (draft, verdict) = self.draft_once(report, &[], attempts, tracker, usage).await?;
        if verdict.passed {
            return Ok((draft, verdict, attempts));
        }
        let mut feedback = verdict.violations.clone();
        let mut best = (draft, verdict);

        while attempts < max_attempts {
            tracker.apply(RunEvent::Rejected);
            attempts += 1;

            let (draft, verdict) = self
                .draft_once(report, &feedback, attempts, tracker, usage)
                .await?;
            if verdict.passed {
                return Ok((draft, verdict, attempts));
            }

            feedback.clone_from(&verdict.violations);
            // Keep the failing draft with the fewest violations
            if verdict.violations.len() < best.1.violations.len() {
                best = (draft, verdict);
            }
        }

        let (draft, verdict) = best;
        if self.settings.export_on_validation_failure || self.force_export {
            tracing::warn!(
                attempts,
                violations = verdict.violations.len(),
                "Validation budget spent, exporting best draft"
            );
            return Ok((draft, verdict, attempts));
        }

        Err(PipelineError::ValidationFailed {
            attempts,
            violations: verdict.violations,
        })
    }

    /// One writing call followed by validation of its draft.
    async fn draft_once(
        &self,
        report: &ResearchReport,
        feedback: &[String],
        attempt: u32,
        tracker: &Tracker,
        usage: &mut TokenUsage,
    ) -> PipelineResult<(DraftPost, ValidationResult)> {
        let style = &self.settings.style;
        let written = self
            .llm_retry
            .run("write", || self.writer.write(report, style, feedback))
            .await
            .map_err(PipelineError::WritingFailed)?;
        usage.add(written.usage);

        tracker.apply(RunEvent::Completed);
        let verdict = validation::validate(&written.draft, style);
        if verdict.passed {
            tracing::info!(
                attempt,
                chars = verdict.stats.length,
                "Draft passed validation"
            );
        } else {
            tracing::warn!(
                attempt,
                violations = ?verdict.violations,
                "Draft failed validation"
            );
        }

        Ok((written.draft, verdict))
    }
}
