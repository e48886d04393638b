//! Draft post validation.
//!
//! Pure checks: the same draft and limits always produce the same verdict,
//! and nothing here touches the network or filesystem.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::PostStyle;
use crate::types::{DraftPost, PostStats, ValidationResult};

/// Hard ceiling on hashtags regardless of configuration.
pub const MAX_HASHTAGS: usize = 10;

/// Minimum blank-line separated blocks in a readable post.
pub const MIN_PARAGRAPHS: usize = 3;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([A-Za-z][A-Za-z0-9_]*)").expect("valid regex"));

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s").expect("valid regex"));

/// A broken style rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Fewer characters than the floor.
    TooShort { length: usize, min: usize },
    /// More characters than the ceiling.
    TooLong { length: usize, max: usize },
    /// Hashtags required but absent.
    MissingHashtags,
    /// More hashtags than allowed.
    TooManyHashtags { count: usize, max: usize },
    /// Hashtags present though disabled.
    UnexpectedHashtags { count: usize },
    /// Not enough paragraphs.
    TooFewParagraphs { count: usize, min: usize },
    /// Markdown headers, which LinkedIn does not render.
    MarkdownHeaders,
    /// No question inviting discussion.
    MissingCallToAction,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { length, min } => {
                write!(f, "Post is too short ({length} < {min} characters)")
            }
            Self::TooLong { length, max } => {
                write!(f, "Post exceeds length limit ({length} > {max} characters)")
            }
            Self::MissingHashtags => write!(f, "No hashtags found"),
            Self::TooManyHashtags { count, max } => {
                write!(f, "Too many hashtags ({count} > {max})")
            }
            Self::UnexpectedHashtags { count } => {
                write!(f, "Hashtags are disabled but {count} were found")
            }
            Self::TooFewParagraphs { count, min } => {
                write!(f, "Too few paragraphs ({count} < {min}); separate sections with blank lines")
            }
            Self::MarkdownHeaders => write!(f, "Contains markdown headers (won't render on LinkedIn)"),
            Self::MissingCallToAction => {
                write!(f, "No call to action; end with an open-ended question")
            }
        }
    }
}

/// Hashtags in `text`, without the `#`, in order of appearance.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Non-empty blank-line separated blocks.
pub fn count_paragraphs(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

impl DraftPost {
    /// Build a draft, measuring the text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            char_count: text.chars().count(),
            hashtags: extract_hashtags(&text),
            text,
        }
    }
}

/// Check a draft against the configured style limits.
pub fn check(draft: &DraftPost, style: &PostStyle) -> Vec<Violation> {
    let mut violations = Vec::new();
    let length = draft.char_count;
    let hashtags = draft.hashtags.len();

    if length < style.min_chars {
        violations.push(Violation::TooShort {
            length,
            min: style.min_chars,
        });
    }
    if length > style.max_chars {
        violations.push(Violation::TooLong {
            length,
            max: style.max_chars,
        });
    }

    if style.include_hashtags {
        let max = style.num_hashtags.min(MAX_HASHTAGS);
        if hashtags == 0 {
            violations.push(Violation::MissingHashtags);
        } else if hashtags > max {
            violations.push(Violation::TooManyHashtags {
                count: hashtags,
                max,
            });
        }
    } else if hashtags > 0 {
        violations.push(Violation::UnexpectedHashtags { count: hashtags });
    }

    let paragraphs = count_paragraphs(&draft.text);
    if paragraphs < MIN_PARAGRAPHS {
        violations.push(Violation::TooFewParagraphs {
            count: paragraphs,
            min: MIN_PARAGRAPHS,
        });
    }

    if HEADER_RE.is_match(&draft.text) {
        violations.push(Violation::MarkdownHeaders);
    }

    if !draft.text.contains('?') {
        violations.push(Violation::MissingCallToAction);
    }

    violations
}

/// Validate a draft into a serializable verdict.
pub fn validate(draft: &DraftPost, style: &PostStyle) -> ValidationResult {
    let violations = check(draft, style);
    ValidationResult {
        passed: violations.is_empty(),
        violations: violations.iter().map(ToString::to_string).collect(),
        stats: PostStats {
            length: draft.char_count,
            paragraphs: count_paragraphs(&draft.text),
            hashtags: draft.hashtags.len(),
        },
    }
}
