//! Research report rendering as markdown with YAML frontmatter.

use std::fmt::Write;

use crate::types::{ResearchReport, RunMetadata};

/// Render a research report for the `_research.md` artifact.
pub fn render_research(report: &ResearchReport, metadata: &RunMetadata) -> String {
    let mut md = String::new();

    // YAML frontmatter
    md.push_str("---\n");
    let _ = writeln!(md, "topic: \"{}\"", yaml_escape(&report.topic));
    let _ = writeln!(md, "run_id: \"{}\"", metadata.run_id);
    let _ = writeln!(md, "generated_at: \"{}\"", metadata.started_at.to_rfc3339());
    let _ = writeln!(md, "model: \"{}\"", yaml_escape(&metadata.model));
    let _ = writeln!(md, "research_depth: {}", metadata.research_depth);
    let _ = writeln!(md, "snippet_fallback: {}", report.snippet_fallback);
    let _ = writeln!(md, "low_confidence: {}", report.low_confidence);
    if !report.source_urls.is_empty() {
        md.push_str("sources:\n");
        for url in &report.source_urls {
            let _ = writeln!(md, "  - \"{}\"", yaml_escape(url));
        }
    }
    md.push_str("---\n\n");

    let _ = writeln!(md, "# Research: {}\n", report.topic);

    if report.low_confidence {
        md.push_str("> **Low confidence:** no web sources could be retrieved for this run.\n\n");
    } else if report.snippet_fallback {
        md.push_str(
            "> **Note:** no page could be scraped; findings rest on search snippets only.\n\n",
        );
    }

    md.push_str("## Summary\n\n");
    let _ = writeln!(md, "{}\n", report.summary.trim());

    if !report.key_findings.is_empty() {
        md.push_str("## Key Findings\n\n");
        for (i, finding) in report.key_findings.iter().enumerate() {
            let _ = write!(md, "{}. {}", i + 1, finding.finding.trim());
            if let Some(url) = finding.source_url.as_deref().filter(|u| !u.is_empty()) {
                let _ = write!(md, " ([source]({url}))");
            }
            md.push('\n');
            if let Some(relevance) = finding.relevance.as_deref().filter(|r| !r.is_empty()) {
                let _ = writeln!(md, "   - *Why it matters:* {relevance}");
            }
        }
        md.push('\n');
    }

    push_list(&mut md, "Statistics", &report.statistics);
    push_list(&mut md, "Expert Insights", &report.expert_insights);
    push_list(&mut md, "Trends", &report.trends);

    if let Some(takeaway) = report.practical_takeaway.as_deref() {
        md.push_str("## Practical Takeaway\n\n");
        let _ = writeln!(md, "{}\n", takeaway.trim());
    }

    if !report.source_urls.is_empty() {
        md.push_str("## Sources\n\n");
        for url in &report.source_urls {
            let _ = writeln!(md, "- <{url}>");
        }
    }

    md
}

fn push_list(md: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(md, "## {heading}\n");
    for item in items {
        let _ = writeln!(md, "- {}", item.trim());
    }
    md.push('\n');
}

fn yaml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchDepth;
    use crate::types::KeyFinding;

    fn report() -> ResearchReport {
        ResearchReport {
            topic: "Remote \"Work\"".into(),
            summary: "Hybrid is winning.".into(),
            key_findings: vec![
                KeyFinding {
                    finding: "Hybrid dominates".into(),
                    source_url: Some("https://a.dev".into()),
                    relevance: Some("Most teams".into()),
                },
                KeyFinding {
                    finding: "Commutes are costly".into(),
                    source_url: None,
                    relevance: None,
                },
            ],
            statistics: vec!["28% of days remote".into()],
            expert_insights: vec![],
            trends: vec!["Office mandates".into()],
            practical_takeaway: Some("Measure outcomes".into()),
            source_urls: vec!["https://a.dev".into()],
            snippet_fallback: false,
            low_confidence: false,
        }
    }

    #[test]
    fn test_render_sections() {
        let meta = RunMetadata::new("Remote \"Work\"", "gemini-1.5-flash", ResearchDepth::Quick);
        let md = render_research(&report(), &meta);

        assert!(md.starts_with("---\ntopic: \"Remote \\\"Work\\\"\"\n"));
        assert!(md.contains("1. Hybrid dominates ([source](https://a.dev))"));
        assert!(md.contains("   - *Why it matters:* Most teams"));
        assert!(md.contains("2. Commutes are costly\n"));
        assert!(md.contains("## Statistics\n\n- 28% of days remote"));
        assert!(!md.contains("## Expert Insights"));
        assert!(md.contains("## Sources\n\n- <https://a.dev>"));
    }

    #[test]
    fn test_render_flags_degraded_evidence() {
        let meta = RunMetadata::new("t", "m", ResearchDepth::Quick);
        let mut report = report();
        report.snippet_fallback = true;
        assert!(render_research(&report, &meta).contains("search snippets only"));

        report.low_confidence = true;
        assert!(render_research(&report, &meta).contains("Low confidence"));
    }
}
