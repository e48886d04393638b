//! Prompt template management.

use handlebars::{Handlebars, TemplateError};
use serde::Serialize;

use crate::errors::ServiceResult;

/// Template name for research synthesis.
pub const RESEARCH_TEMPLATE_NAME: &str = "research";

/// Template name for post writing.
pub const WRITER_TEMPLATE_NAME: &str = "writer";

/// Manages Handlebars prompt templates.
pub struct PromptManager {
    handlebars: Handlebars<'static>,
}

impl PromptManager {
    /// Create a new prompt manager with embedded templates.
    pub fn new() -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle URLs and quotes.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);

        handlebars.register_template_string(RESEARCH_TEMPLATE_NAME, RESEARCH_TEMPLATE)?;
        handlebars.register_template_string(WRITER_TEMPLATE_NAME, WRITER_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    /// Render a template with the given data.
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> ServiceResult<String> {
        Ok(self.handlebars.render(template, data)?)
    }
}

/// System prompt for the research analyst.
pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a Senior Research Analyst with 15+ years of experience in technology research and market analysis.

You synthesize information from multiple sources, separate facts from opinions, and \
always attribute findings to the source URL they came from. You prefer recent, \
authoritative sources and concrete numbers over generalities. Your reports feed \
professional LinkedIn content, so focus on insights a professional audience can act on.";

/// System prompt for the post writer.
pub const WRITER_SYSTEM_PROMPT: &str = "You are an Expert LinkedIn Content Strategist specializing in B2B technology thought leadership.

Every post you write follows the same structure: a hook that stops the scroll, short \
context on why the topic matters now, 3-5 concrete insights backed by data, a practical \
takeaway, and a single open question inviting discussion. You write short paragraphs \
separated by blank lines, use bullet points (•) for lists, never use markdown headers, \
and never include placeholder text. Hashtags go at the very end, properly capitalized.";

/// Research synthesis prompt template.
const RESEARCH_TEMPLATE: &str = r#"Research the following topic and produce a structured report.

TOPIC: {{topic}}

{{#if pages}}
## Scraped Sources
{{#each pages}}
### {{#if this.title}}{{this.title}}{{else}}{{this.url}}{{/if}}
URL: {{this.url}}

{{this.text}}

{{/each}}
{{/if}}
{{#if results}}
## Search Results
{{#each results}}
{{this.rank}}. {{this.title}}
   URL: {{this.url}}
   {{this.snippet}}
{{/each}}
{{/if}}
{{#if snippet_fallback}}
NOTE: No page could be scraped. Work from the search snippets above and be explicit
about what they do not establish.
{{/if}}
{{#unless has_evidence}}
NOTE: No web evidence was retrieved. Draw on well-established knowledge only, avoid
precise statistics you cannot attribute, and leave source_url empty.
{{/unless}}

## Task
Identify 3-5 key findings a professional audience should know: what is new or
trending, what the numbers say, who the key players are, and the practical takeaway.
Attribute every finding to one of the URLs above when possible.

Respond with JSON:
{
  "summary": "<2-3 sentence overview of the current state of the topic>",
  "key_findings": [
    {"finding": "<insight>", "source_url": "<URL or null>", "relevance": "<why it matters>"}
  ],
  "statistics": ["<data point with context>"],
  "expert_insights": ["<notable opinion and who holds it>"],
  "trends": ["<emerging trend>"],
  "practical_takeaway": "<what professionals should do with this>"
}
"#;

/// Post writing prompt template.
const WRITER_TEMPLATE: &str = r#"Create a publication-ready LinkedIn post based on this research.

TARGET TOPIC: {{topic}}

## Research Summary
{{summary}}

## Key Findings
{{#each key_findings}}
- {{this.finding}}{{#if this.source_url}} (Source: {{this.source_url}}){{/if}}
{{/each}}
{{#if statistics}}

## Supporting Data
{{#each statistics}}
- {{this}}
{{/each}}
{{/if}}
{{#if trends}}

## Trends
{{#each trends}}
- {{this}}
{{/each}}
{{/if}}
{{#if practical_takeaway}}

## Takeaway
{{practical_takeaway}}
{{/if}}

## Requirements
- Tone: {{tone}}
- Total length between {{min_chars}} and {{max_chars}} characters, including hashtags
- 3-5 key points, each 1-2 sentences with specific data from the research
- The call to action must be an open-ended question
{{#if include_hashtags}}
- Exactly {{num_hashtags}} relevant hashtags, properly capitalized, without the # sign
{{else}}
- No hashtags; return an empty hashtags list
{{/if}}
- No markdown headers, no links, no placeholder text
{{#if feedback}}

## Fix These Problems From The Previous Draft
{{#each feedback}}
- {{this}}
{{/each}}
{{/if}}

Respond with JSON:
{
  "hook": "<1-2 line opener: question, surprising statistic or bold statement>",
  "context": "<2-3 lines on why this matters now>",
  "key_points": ["<insight>"],
  "takeaway": "<1-2 line practical implication>",
  "call_to_action": "<one open-ended question>",
  "hashtags": ["<Hashtag>"]
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_research_template_renders_evidence() {
        let prompts = PromptManager::new().unwrap();
        let rendered = prompts
            .render(
                RESEARCH_TEMPLATE_NAME,
                &json!({
                    "topic": "Rust in production",
                    "pages": [{"url": "https://a.dev?x=1&y=2", "title": "A", "text": "Body A"}],
                    "results": [{"rank": 1, "title": "A", "url": "https://a.dev", "snippet": "snip"}],
                    "snippet_fallback": false,
                    "has_evidence": true
                }),
            )
            .unwrap();

        assert!(rendered.contains("TOPIC: Rust in production"));
        assert!(rendered.contains("### A\nURL: https://a.dev?x=1&y=2"));
        // No HTML escaping
        assert!(rendered.contains("https://a.dev?x=1&y=2"));
        assert!(!rendered.contains("No web evidence"));
    }

    #[test]
    fn test_research_template_without_evidence() {
        let prompts = PromptManager::new().unwrap();
        let rendered = prompts
            .render(
                RESEARCH_TEMPLATE_NAME,
                &json!({
                    "topic": "t",
                    "pages": [],
                    "results": [],
                    "snippet_fallback": false,
                    "has_evidence": false
                }),
            )
            .unwrap();
        assert!(rendered.contains("No web evidence was retrieved"));
    }

    #[test]
    fn test_writer_template_includes_feedback() {
        let prompts = PromptManager::new().unwrap();
        let rendered = prompts
            .render(
                WRITER_TEMPLATE_NAME,
                &json!({
                    "topic": "t",
                    "summary": "s",
                    "key_findings": [{"finding": "f", "source_url": null}],
                    "statistics": [],
                    "trends": [],
                    "practical_takeaway": null,
                    "tone": "friendly",
                    "min_chars": 100,
                    "max_chars": 3000,
                    "include_hashtags": true,
                    "num_hashtags": 5,
                    "feedback": ["Post is too long (3500 > 3000 characters)"]
                }),
            )
            .unwrap();

        assert!(rendered.contains("Exactly 5 relevant hashtags"));
        assert!(rendered.contains("Post is too long"));
        assert!(rendered.contains("- f\n"));
    }

    #[test]
    fn test_missing_field_is_error() {
        let prompts = PromptManager::new().unwrap();
        assert!(prompts
            .render(WRITER_TEMPLATE_NAME, &json!({"topic": "t"}))
            .is_err());
    }
}
