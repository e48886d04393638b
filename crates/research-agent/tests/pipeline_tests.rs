//! End-to-end pipeline tests against deterministic fake providers.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use research_agent::ai::{AIMessage, AIProvider, AIResponse, GenerateOptions, TokenUsage};
use research_agent::analysis::RESEARCH_SYSTEM_PROMPT;
use research_agent::config::ResearchDepth;
use research_agent::enrichment::{PageContent, ScrapeProvider};
use research_agent::pipeline::{Pipeline, RunState};
use research_agent::search::SearchProvider;
use research_agent::storage::Exporter;
use research_agent::{PipelineError, SearchResult, ServiceError, ServiceResult, Settings};

const TOPIC: &str = "Remote Work Productivity Statistics 2025";

const REPORT_JSON: &str = r#"{
  "summary": "Hybrid work has settled in as the default for knowledge workers.",
  "key_findings": [
    {"finding": "Hybrid teams report the highest output per hour", "source_url": "https://site1.dev/article", "relevance": "Most teams are hybrid"}
  ],
  "statistics": ["28% of paid work days are remote"],
  "trends": ["Office mandates are softening"],
  "practical_takeaway": "Measure outcomes, not presence."
}"#;

const POST_JSON: &str = r##"{
  "hook": "Is remote work really killing productivity?",
  "context": "The 2025 numbers tell a more nuanced story than the headlines.",
  "key_points": [
    "Hybrid teams report the highest output per hour",
    "28% of paid work days are now remote",
    "Office mandates are quietly softening"
  ],
  "takeaway": "Measure outcomes, not presence.",
  "call_to_action": "What has worked for your team?",
  "hashtags": ["RemoteWork", "FutureOfWork", "Productivity"]
}"##;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Returns `count` hits for every query, or fails every time.
struct FakeSearch {
    count: usize,
    fail: bool,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    fn with_hits(count: usize) -> Self {
        Self {
            count,
            fail: false,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_hits(0)
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_hits(5)
        }
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str, max_results: usize) -> ServiceResult<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ServiceError::Api {
                status: 401,
                message: "invalid api key".into(),
            });
        }
        Ok((1..=self.count.min(max_results))
            .map(|n| SearchResult {
                title: format!("Article {n}"),
                url: format!("https://site{n}.dev/article"),
                snippet: format!("Snippet {n} about remote work"),
                rank: n,
            })
            .collect())
    }
}

/// Scrapes every URL, or fails every URL.
struct FakeScraper {
    fail: bool,
    fetched: AtomicU32,
}

impl FakeScraper {
    fn ok() -> Self {
        Self {
            fail: false,
            fetched: AtomicU32::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            fetched: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ScrapeProvider for FakeScraper {
    async fn fetch(&self, url: &str) -> ServiceResult<PageContent> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ServiceError::Api {
                status: 403,
                message: "blocked".into(),
            });
        }
        Ok(PageContent {
            title: Some(format!("Page at {url}")),
            markdown: format!("Remote work data published at {url}."),
        })
    }
}

/// Answers research prompts with a report and writing prompts with a post.
struct FakeLlm {
    report: String,
    post: String,
    synthesis_failures: AtomicU32,
    synthesis_calls: AtomicU32,
    writing_calls: AtomicU32,
}

impl FakeLlm {
    fn new() -> Self {
        Self {
            report: REPORT_JSON.to_string(),
            post: POST_JSON.to_string(),
            synthesis_failures: AtomicU32::new(0),
            synthesis_calls: AtomicU32::new(0),
            writing_calls: AtomicU32::new(0),
        }
    }

    fn with_post(mut self, post: &str) -> Self {
        self.post = post.to_string();
        self
    }

    fn failing_synthesis(self, times: u32) -> Self {
        self.synthesis_failures.store(times, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl AIProvider for FakeLlm {
    fn name(&self) -> &'static str {
        "fake"
    }
    fn api_key_env_var(&self) -> &'static str {
        "FAKE_API_KEY"
    }
    fn is_configured(&self) -> bool {
        true
    }
    fn model_prefixes(&self) -> &'static [&'static str] {
        &[""]
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        _options: &GenerateOptions,
    ) -> ServiceResult<AIResponse> {
        let research = messages
            .first()
            .is_some_and(|m| m.content == RESEARCH_SYSTEM_PROMPT);

        let text = if research {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.synthesis_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.synthesis_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ServiceError::Api {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            self.report.clone()
        } else {
            self.writing_calls.fetch_add(1, Ordering::SeqCst);
            self.post.clone()
        };

        Ok(AIResponse {
            text,
            usage: TokenUsage::new(200, 100),
            model: model.to_string(),
            provider: "fake".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings() -> Settings {
    Settings {
        research_depth: ResearchDepth::Quick,
        ..Settings::default()
    }
}

fn build(
    settings: Settings,
    search: Arc<FakeSearch>,
    scraper: Arc<FakeScraper>,
    llm: Arc<FakeLlm>,
) -> Pipeline {
    Pipeline::new(settings, search, scraper, llm)
        .unwrap()
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_run_exports_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let search = Arc::new(FakeSearch::with_hits(5));
    let scraper = Arc::new(FakeScraper::ok());
    let llm = Arc::new(FakeLlm::new());
    let settings = settings();
    let max_chars = settings.style.max_chars;

    let outcome = build(settings, search, scraper.clone(), llm)
        .run(TOPIC, &Exporter::new(dir.path()))
        .await
        .unwrap();

    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(outcome.metadata.search_results, 5);
    assert_eq!(scraper.fetched.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.report.source_urls.len(), 3);
    assert!(!outcome.report.snippet_fallback);
    assert!(outcome.validation.passed);
    assert!(outcome.draft.char_count <= max_chars);

    let stem = format!(
        "remote_work_productivity_statistics_2025_{}",
        outcome.metadata.started_at.format("%Y%m%d_%H%M%S")
    );
    assert_eq!(
        file_names(dir.path()),
        vec![
            format!("{stem}_metadata.json"),
            format!("{stem}_post.txt"),
            format!("{stem}_research.md"),
        ]
    );

    let post = std::fs::read_to_string(dir.path().join(format!("{stem}_post.txt"))).unwrap();
    assert_eq!(post, outcome.draft.text);

    let metadata: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(format!("{stem}_metadata.json"))).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["topic"], TOPIC);
    assert_eq!(metadata["provider"], "fake");
    assert_eq!(metadata["writing_attempts"], 1);
    assert_eq!(metadata["token_usage"]["total_tokens"], 600);
    assert_eq!(metadata["validation"]["passed"], true);
}

#[tokio::test]
async fn test_comprehensive_depth_merges_queries() {
    let dir = tempfile::tempdir().unwrap();
    let search = Arc::new(FakeSearch::with_hits(5));
    let settings = Settings {
        research_depth: ResearchDepth::Comprehensive,
        ..Settings::default()
    };

    let outcome = build(
        settings,
        search.clone(),
        Arc::new(FakeScraper::ok()),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap();

    let mut queries = search.queries.lock().unwrap().clone();
    queries.sort();
    assert_eq!(
        queries,
        vec![
            TOPIC.to_string(),
            format!("{TOPIC} expert insights trends"),
            format!("{TOPIC} statistics data"),
        ]
    );
    // Every query returns the same URLs
    assert_eq!(outcome.metadata.search_results, 5);
}

#[tokio::test]
async fn test_empty_search_is_low_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let scraper = Arc::new(FakeScraper::ok());

    let outcome = build(
        settings(),
        Arc::new(FakeSearch::with_hits(0)),
        scraper.clone(),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap();

    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(scraper.fetched.load(Ordering::SeqCst), 0);
    assert!(outcome.report.low_confidence);
    assert!(outcome.report.source_urls.is_empty());
    assert!(outcome.metadata.low_confidence);
}

#[tokio::test]
async fn test_search_outage_still_completes() {
    let dir = tempfile::tempdir().unwrap();

    let outcome = build(
        settings(),
        Arc::new(FakeSearch::failing()),
        Arc::new(FakeScraper::ok()),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap();

    assert_eq!(outcome.state, RunState::Done);
    assert!(outcome.metadata.degraded);
    assert!(outcome.report.low_confidence);
    assert_eq!(outcome.files.all().len(), 3);
}

#[tokio::test]
async fn test_all_scrapes_failing_falls_back_to_snippets() {
    let dir = tempfile::tempdir().unwrap();

    let outcome = build(
        settings(),
        Arc::new(FakeSearch::with_hits(5)),
        Arc::new(FakeScraper::failing()),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap();

    assert_eq!(outcome.state, RunState::Done);
    assert!(outcome.metadata.degraded);
    assert_eq!(outcome.metadata.pages_attempted, 3);
    assert_eq!(outcome.metadata.pages_scraped, 0);
    assert_eq!(outcome.metadata.degraded_reasons.len(), 3);
    assert!(outcome.report.snippet_fallback);
    assert!(!outcome.report.low_confidence);
    assert_eq!(outcome.report.source_urls.len(), 5);
}

#[tokio::test]
async fn test_synthesis_recovers_within_retry_budget() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(FakeLlm::new().failing_synthesis(2));
    let settings = Settings {
        max_retries: 2,
        ..settings()
    };

    let outcome = build(
        settings,
        Arc::new(FakeSearch::with_hits(5)),
        Arc::new(FakeScraper::ok()),
        llm.clone(),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap();

    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(llm.synthesis_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_synthesis_fails_past_retry_budget() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(FakeLlm::new().failing_synthesis(3));
    let states = Arc::new(Mutex::new(Vec::new()));
    let recorded = states.clone();
    let settings = Settings {
        max_retries: 2,
        ..settings()
    };

    let err = build(
        settings,
        Arc::new(FakeSearch::with_hits(5)),
        Arc::new(FakeScraper::ok()),
        llm.clone(),
    )
    .with_progress(move |state| recorded.lock().unwrap().push(state))
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::SynthesisFailed(_)));
    assert_eq!(llm.synthesis_calls.load(Ordering::SeqCst), 3);
    assert_eq!(llm.writing_calls.load(Ordering::SeqCst), 0);
    assert_eq!(states.lock().unwrap().last(), Some(&RunState::Failed));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_writing_attempts_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(FakeLlm::new().with_post("Too short to pass."));
    let settings = Settings {
        max_validation_retries: 2,
        export_on_validation_failure: true,
        ..settings()
    };

    let outcome = build(
        settings,
        Arc::new(FakeSearch::with_hits(5)),
        Arc::new(FakeScraper::ok()),
        llm.clone(),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap();

    assert_eq!(llm.writing_calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.metadata.writing_attempts, 3);
    assert!(outcome.metadata.exported_with_violations);
    assert!(!outcome.metadata.forced_export);
    assert!(!outcome.validation.passed);
    assert!(!outcome.warnings.is_empty());

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(outcome.files.metadata.as_ref().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(json["exported_with_violations"], true);
    assert_eq!(json["forced_export"], false);
}

#[tokio::test]
async fn test_export_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("outputs");
    std::fs::write(&blocker, "not a directory").unwrap();

    let err = build(
        settings(),
        Arc::new(FakeSearch::with_hits(5)),
        Arc::new(FakeScraper::ok()),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(&blocker))
    .await
    .unwrap_err();

    match err {
        PipelineError::ExportFailed { written, .. } => assert!(written.is_empty()),
        other => panic!("expected ExportFailed, got {other:?}"),
    }
    assert_eq!(file_names(dir.path()), vec!["outputs".to_string()]);
}

#[tokio::test]
async fn test_run_budget_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        max_execution_time: Duration::from_millis(100),
        ..settings()
    };

    let err = build(
        settings,
        Arc::new(FakeSearch::slow(Duration::from_secs(5))),
        Arc::new(FakeScraper::ok()),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(dir.path()))
    .await
    .unwrap_err();

    match err {
        PipelineError::Timeout { stage, .. } => assert_eq!(stage, RunState::Searching),
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_research_file_can_be_skipped() {
    let dir = tempfile::tempdir().unwrap();

    let outcome = build(
        settings(),
        Arc::new(FakeSearch::with_hits(5)),
        Arc::new(FakeScraper::ok()),
        Arc::new(FakeLlm::new()),
    )
    .run(TOPIC, &Exporter::new(dir.path()).with_save_research(false))
    .await
    .unwrap();

    assert!(outcome.files.research.is_none());
    assert_eq!(file_names(dir.path()).len(), 2);
}
