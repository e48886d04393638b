//! Output group export.
//!
//! A run's files are committed together. Every file is first staged as a
//! temporary file inside the output directory, then each is renamed into
//! place. If any rename fails, the files already renamed are removed again,
//! so a failed export leaves nothing behind unless cleanup itself fails, in
//! which case the leftovers are named in the error.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::{PipelineError, PipelineResult};
use crate::types::{DraftPost, ExportedFiles, ResearchReport, RunMetadata};

use super::markdown::render_research;

/// Longest slug used in file names.
pub const MAX_SLUG_LEN: usize = 50;

/// File name timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Run id characters appended when names collide.
const RUN_ID_SUFFIX_LEN: usize = 8;

/// Filesystem-safe form of a topic.
///
/// ASCII letters and digits are lowercased; everything else becomes `_`.
pub fn slugify(topic: &str) -> String {
    let slug: String = topic
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(MAX_SLUG_LEN)
        .collect();

    if slug.chars().all(|c| c == '_') {
        "topic".to_string()
    } else {
        slug
    }
}

/// Writes a run's artifacts to an output directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    save_research: bool,
}

impl Exporter {
    /// Create an exporter for `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            save_research: true,
        }
    }

    /// Whether to include the research markdown in the group.
    #[must_use]
    pub fn with_save_research(mut self, save_research: bool) -> Self {
        self.save_research = save_research;
        self
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Final paths for a run, keyed off its start time.
    #[must_use]
    pub fn planned_files(&self, metadata: &RunMetadata) -> ExportedFiles {
        self.files_for(&base_stem(metadata))
    }

    /// Planned paths, or run-id suffixed ones when an earlier run in the
    /// same second already claimed the names.
    fn available_files(&self, metadata: &RunMetadata) -> ExportedFiles {
        let files = self.planned_files(metadata);
        if !files.post.as_deref().is_some_and(Path::exists) {
            return files;
        }

        let run_id = metadata.run_id.simple().to_string();
        let stem = format!("{}_{}", base_stem(metadata), &run_id[..RUN_ID_SUFFIX_LEN]);
        tracing::debug!(%stem, "Output names taken, adding run id");
        self.files_for(&stem)
    }

    fn files_for(&self, stem: &str) -> ExportedFiles {
        let path = |suffix: &str| Some(self.output_dir.join(format!("{stem}_{suffix}")));

        ExportedFiles {
            post: path("post.txt"),
            research: if self.save_research {
                path("research.md")
            } else {
                None
            },
            metadata: path("metadata.json"),
        }
    }

    /// Write post, research and metadata as one group.
    ///
    /// On success `metadata.files` lists the committed paths.
    pub fn export(
        &self,
        draft: &DraftPost,
        report: &ResearchReport,
        metadata: &mut RunMetadata,
    ) -> PipelineResult<ExportedFiles> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| PipelineError::ExportFailed {
            reason: format!(
                "cannot create output directory {}: {e}",
                self.output_dir.display()
            ),
            written: Vec::new(),
        })?;

        let files = self.available_files(metadata);
        metadata.files = files.clone();

        let metadata_json =
            serde_json::to_string_pretty(metadata).map_err(|e| PipelineError::ExportFailed {
                reason: format!("cannot serialize metadata: {e}"),
                written: Vec::new(),
            })?;

        let mut group: Vec<(PathBuf, String)> = Vec::with_capacity(3);
        if let Some(path) = &files.post {
            group.push((path.clone(), draft.text.clone()));
        }
        if let Some(path) = &files.research {
            group.push((path.clone(), render_research(report, metadata)));
        }
        if let Some(path) = &files.metadata {
            group.push((path.clone(), metadata_json));
        }

        let staged = self.stage(&group)?;
        commit(staged)?;

        for path in files.all() {
            tracing::info!(path = %path.display(), "Wrote output file");
        }
        Ok(files)
    }

    /// Write every file's contents to a temporary file next to its target.
    fn stage(&self, group: &[(PathBuf, String)]) -> PipelineResult<Vec<(NamedTempFile, PathBuf)>> {
        let mut staged = Vec::with_capacity(group.len());
        for (target, contents) in group {
            let temp = NamedTempFile::new_in(&self.output_dir)
                .and_then(|mut file| {
                    file.write_all(contents.as_bytes())?;
                    file.as_file().sync_all()?;
                    Ok(file)
                })
                .map_err(|e| PipelineError::ExportFailed {
                    reason: format!("cannot stage {}: {e}", target.display()),
                    written: Vec::new(),
                })?;
            staged.push((temp, target.clone()));
        }
        Ok(staged)
    }
}

fn base_stem(metadata: &RunMetadata) -> String {
    format!(
        "{}_{}",
        slugify(&metadata.topic),
        metadata.started_at.format(TIMESTAMP_FORMAT)
    )
}

/// Move staged files into place, undoing earlier moves on failure.
fn commit(staged: Vec<(NamedTempFile, PathBuf)>) -> PipelineResult<()> {
    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());

    for (temp, target) in staged {
        if let Err(e) = temp.persist_noclobber(&target) {
            let reason = format!("cannot write {}: {}", target.display(), e.error);
            tracing::error!(%reason, committed = committed.len(), "Export failed, rolling back");
            return Err(PipelineError::ExportFailed {
                reason,
                written: rollback(committed),
            });
        }
        committed.push(target);
    }
    Ok(())
}

/// Remove committed files; returns the ones that could not be removed.
fn rollback(committed: Vec<PathBuf>) -> Vec<PathBuf> {
    committed
        .into_iter()
        .filter(|path| match std::fs::remove_file(path) {
            Ok(()) => false,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to roll back file");
                true
            }
        })
        .collect()
}
