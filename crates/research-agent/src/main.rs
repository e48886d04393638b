//! Research agent CLI - topic to LinkedIn post pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use research_agent::ai::ProviderRegistry;
use research_agent::config::REQUIRED_KEYS;
use research_agent::enrichment::FirecrawlClient;
use research_agent::pipeline::{Pipeline, RunOutcome, RunState};
use research_agent::search::TavilyClient;
use research_agent::storage::Exporter;
use research_agent::Settings;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";

/// Research agent - research a topic and draft a LinkedIn post about it.
#[derive(Parser)]
#[command(name = "research-agent")]
#[command(about = "Research a topic on the web and draft a LinkedIn post")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Research a topic and write a post
    Research {
        /// Topic to research
        topic: String,

        /// Directory for the exported files
        #[arg(long, default_value = "./outputs")]
        output_dir: PathBuf,

        /// Skip the research markdown file
        #[arg(long)]
        no_save_research: bool,

        /// Skip the post preview after the run
        #[arg(long)]
        no_interactive: bool,

        /// Export the best draft even if it never passes validation
        #[arg(long)]
        force_export: bool,
    },

    /// Check that required API keys are set
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("research_agent=debug,info")
        } else {
            EnvFilter::new("research_agent=info,warn")
        }
    });

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    match cli.command {
        Commands::Research {
            topic,
            output_dir,
            no_save_research,
            no_interactive,
            force_export,
        } => {
            run_research(
                &topic,
                output_dir,
                !no_save_research,
                !no_interactive,
                force_export,
            )
            .await
        }
        Commands::ValidateConfig => run_validate_config(),
    }
}

async fn run_research(
    topic: &str,
    output_dir: PathBuf,
    save_research: bool,
    interactive: bool,
    force_export: bool,
) -> Result<()> {
    let settings = Settings::from_env()?;

    let missing = settings.missing_credentials();
    if !missing.is_empty() {
        anyhow::bail!(
            "Missing required configuration: {} (run `research-agent validate-config`)",
            missing.join(", ")
        );
    }
    tracing::debug!(?settings, "Loaded settings");

    let llm = ProviderRegistry::from_settings(&settings)
        .require_for_model(&settings.llm_model)
        .context("No usable LLM provider")?;

    let search = TavilyClient::new(
        settings.tavily_api_key.clone().unwrap_or_default(),
        settings.request_timeout,
    )?;
    let scraper = FirecrawlClient::new(
        settings.firecrawl_api_key.clone().unwrap_or_default(),
        settings.request_timeout,
    )?;

    let spinner = create_spinner();
    let progress = spinner.clone();

    let pipeline = Pipeline::new(settings, Arc::new(search), Arc::new(scraper), llm)?
        .with_force_export(force_export)
        .with_progress(move |state| {
            if !state.is_terminal() {
                progress.set_message(state.description());
            }
        });

    let exporter = Exporter::new(output_dir).with_save_research(save_research);

    println!("🔍 Researching: {}\n", topic.cyan().bold());
    let result = pipeline.run(topic, &exporter).await;

    match result {
        Ok(outcome) => {
            spinner.finish_and_clear();
            print_outcome(&outcome, interactive);
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            println!(
                "{} {}",
                "✗".red().bold(),
                format!("Run failed during {}", e.stage()).red()
            );
            Err(e.into())
        }
    }
}

fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
        spinner.set_style(style);
    }
    spinner.set_message(RunState::Init.description());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_outcome(outcome: &RunOutcome, interactive: bool) {
    let meta = &outcome.metadata;

    if interactive {
        println!("{}", "═".repeat(70).bright_black());
        println!("{}", "LinkedIn Post".cyan().bold());
        println!("{}", "═".repeat(70).bright_black());
        println!("{}\n", outcome.draft.text);
        println!("{}", "═".repeat(70).bright_black());

        println!("\n📊 Run Summary");
        println!("   Run ID: {}", meta.run_id);
        println!("   Model: {} ({})", meta.model, meta.provider);
        println!("   Depth: {}", meta.research_depth);
        println!("   Search results: {}", meta.search_results);
        println!(
            "   Pages scraped: {}/{}",
            meta.pages_scraped, meta.pages_attempted
        );
        println!(
            "   Post: {} chars, {} paragraphs, {} hashtags",
            outcome.validation.stats.length,
            outcome.validation.stats.paragraphs,
            outcome.validation.stats.hashtags
        );
        println!("   Writing attempts: {}", meta.writing_attempts);
        println!(
            "   Tokens: {} (≈ ${:.4})",
            meta.token_usage.total_tokens, meta.estimated_cost_usd
        );
    }

    if !outcome.warnings.is_empty() {
        println!();
        for warning in &outcome.warnings {
            println!("{} {}", "⚠".yellow().bold(), warning.yellow());
        }
    }
    if outcome.report.low_confidence {
        println!(
            "{} {}",
            "⚠".yellow().bold(),
            "No web sources were available; treat this post as low confidence.".yellow()
        );
    }

    println!();
    for path in outcome.files.all() {
        println!("{} {}", "✓".green().bold(), path.display());
    }
}

fn run_validate_config() -> Result<()> {
    let settings = Settings::from_env()?;
    let missing = settings.missing_credentials();

    println!("🔐 Configuration check\n");
    for key in REQUIRED_KEYS {
        let status = if missing.contains(key) {
            "✗".red()
        } else {
            "✓".green()
        };
        println!("  {status} {key}");
    }

    let anthropic = if settings.anthropic_api_key.is_some() {
        "✓".green()
    } else {
        "-".bright_black()
    };
    println!("  {anthropic} ANTHROPIC_API_KEY (optional)");
    println!("\n  Model: {}", settings.llm_model);

    if missing.is_empty() {
        println!("\n{} {}", "✓".green().bold(), "Ready to run".green());
        Ok(())
    } else {
        println!(
            "\n{} {}",
            "✗".red().bold(),
            format!("Missing: {}", missing.join(", ")).red()
        );
        std::process::exit(1);
    }
}
