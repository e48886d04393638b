//! LinkedIn post writing using an LLM provider.

use std::sync::Arc;

use serde::Deserialize;

use crate::ai::{parse_ai_response, AIMessage, AIProvider, GenerateOptions, TokenUsage};
use crate::config::PostStyle;
use crate::errors::{ServiceError, ServiceResult};
use crate::types::{DraftPost, ResearchReport};

use super::prompts::{PromptManager, WRITER_SYSTEM_PROMPT, WRITER_TEMPLATE_NAME};

/// Draft plus what it cost to produce.
#[derive(Debug, Clone)]
pub struct Written {
    /// The draft.
    pub draft: DraftPost,
    /// Tokens spent.
    pub usage: TokenUsage,
}

/// Structured post as returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct PostSections {
    /// Opening line(s).
    pub hook: String,
    /// Why the topic matters now.
    #[serde(default)]
    pub context: String,
    /// Core insights.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Practical implication.
    #[serde(default)]
    pub takeaway: String,
    /// Closing question.
    #[serde(default)]
    pub call_to_action: String,
    /// Tags, with or without `#`.
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl PostSections {
    /// Lay the sections out as LinkedIn-ready text.
    #[must_use]
    pub fn format(&self, include_hashtags: bool) -> String {
        let mut blocks: Vec<String> = Vec::new();

        for section in [&self.hook, &self.context] {
            if !section.trim().is_empty() {
                blocks.push(section.trim().to_string());
            }
        }

        let points: Vec<String> = self
            .key_points
            .iter()
            .map(|p| p.trim().trim_start_matches(['•', '-', '*']).trim())
            .filter(|p| !p.is_empty())
            .map(|p| format!("• {p}"))
            .collect();
        if !points.is_empty() {
            blocks.push(points.join("\n"));
        }

        for section in [&self.takeaway, &self.call_to_action] {
            if !section.trim().is_empty() {
                blocks.push(section.trim().to_string());
            }
        }

        if include_hashtags {
            let tags: Vec<String> = self
                .hashtags
                .iter()
                .map(|t| t.trim().trim_start_matches('#').replace(' ', ""))
                .filter(|t| !t.is_empty())
                .map(|t| format!("#{t}"))
                .collect();
            if !tags.is_empty() {
                blocks.push(tags.join(" "));
            }
        }

        blocks.join("\n\n")
    }
}

/// Writes post drafts from research reports.
pub struct PostWriter {
    provider: Arc<dyn AIProvider>,
    prompts: Arc<PromptManager>,
    model: String,
    options: GenerateOptions,
}

impl PostWriter {
    /// Create a new writer.
    pub fn new(
        provider: Arc<dyn AIProvider>,
        prompts: Arc<PromptManager>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            prompts,
            model: model.into(),
            options: GenerateOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                json_mode: true,
                ..Default::default()
            },
        }
    }

    /// Build the writing prompt.
    ///
    /// `feedback` lists problems with the previous draft, if any.
    pub fn build_prompt(
        &self,
        report: &ResearchReport,
        style: &PostStyle,
        feedback: &[String],
    ) -> ServiceResult<String> {
        let data = serde_json::json!({
            "topic": report.topic,
            "summary": report.summary,
            "key_findings": report.key_findings,
            "statistics": report.statistics,
            "trends": report.trends,
            "practical_takeaway": report.practical_takeaway,
            "tone": style.tone,
            "min_chars": style.min_chars,
            "max_chars": style.max_chars,
            "include_hashtags": style.include_hashtags,
            "num_hashtags": style.num_hashtags,
            "feedback": feedback,
        });

        self.prompts.render(WRITER_TEMPLATE_NAME, &data)
    }

    /// Make one writing call.
    pub async fn write(
        &self,
        report: &ResearchReport,
        style: &PostStyle,
        feedback: &[String],
    ) -> ServiceResult<Written> {
        let prompt = self.build_prompt(report, style, feedback)?;
        let messages = vec![AIMessage::system(WRITER_SYSTEM_PROMPT), AIMessage::user(prompt)];

        let response = self
            .provider
            .generate_text(&self.model, &messages, &self.options)
            .await?;

        let text = match parse_ai_response::<PostSections>(&response) {
            Ok(sections) => sections.format(style.include_hashtags),
            Err(ServiceError::Parse(reason)) => {
                tracing::warn!(%reason, "Post response was not JSON, using raw text");
                response.text.trim().to_string()
            }
            Err(e) => return Err(e),
        };

        if text.trim().is_empty() {
            return Err(ServiceError::Parse("Model returned an empty post".to_string()));
        }

        let draft = DraftPost::new(text);
        tracing::info!(
            chars = draft.char_count,
            hashtags = draft.hashtags.len(),
            regenerated = !feedback.is_empty(),
            "Post drafted"
        );

        Ok(Written {
            draft,
            usage: response.usage,
        })
    }
}
