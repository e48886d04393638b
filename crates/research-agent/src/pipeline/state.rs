//! Run state machine.
//!
//! The orchestrator holds a single [`RunState`] and advances it only through
//! [`RunState::on`], so every legal path through a run is listed in one table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage a run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Validating input, nothing sent yet.
    Init,
    /// Running search queries.
    Searching,
    /// Fetching page text for top results.
    Scraping,
    /// Building the research report.
    Synthesizing,
    /// Drafting the post.
    Writing,
    /// Checking the draft against style limits.
    Validating,
    /// Writing output files.
    Exporting,
    /// Run finished.
    Done,
    /// Run ended on an unrecovered error.
    Failed,
}

/// Outcome of the work done in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Stage finished; move forward.
    Completed,
    /// Draft failed validation and regeneration budget remains.
    Rejected,
    /// Stage hit a fatal error.
    Errored,
}

impl RunState {
    /// Transition table.
    ///
    /// Terminal states absorb every event.
    #[must_use]
    pub fn on(self, event: RunEvent) -> Self {
        use RunEvent::{Completed, Errored, Rejected};

        match (self, event) {
            (Self::Done, _) => Self::Done,
            (Self::Failed, _) | (_, Errored) => Self::Failed,
            (Self::Init, Completed) => Self::Searching,
            (Self::Searching, Completed) => Self::Scraping,
            (Self::Scraping, Completed) => Self::Synthesizing,
            (Self::Synthesizing, Completed) => Self::Writing,
            (Self::Writing, Completed) => Self::Validating,
            (Self::Validating, Completed) => Self::Exporting,
            (Self::Validating, Rejected) => Self::Writing,
            (Self::Exporting, Completed) => Self::Done,
            // Only validation can reject a result.
            (state, Rejected) => state,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Init => "Preparing run",
            Self::Searching => "Searching the web",
            Self::Scraping => "Scraping top sources",
            Self::Synthesizing => "Synthesizing research",
            Self::Writing => "Writing post",
            Self::Validating => "Validating post",
            Self::Exporting => "Exporting files",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Short identifier used in logs and metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Searching => "searching",
            Self::Scraping => "scraping",
            Self::Synthesizing => "synthesizing",
            Self::Writing => "writing",
            Self::Validating => "validating",
            Self::Exporting => "exporting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
