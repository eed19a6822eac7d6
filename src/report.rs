//! Run outcome reporting: per-chapter reports and the final [`RunResult`].
//!
//! Per-image and per-chapter failures are recovered locally and recorded
//! here; only discovery failure, an unwritable output root, and explicit
//! cancellation surface as a fatal [`RunError`].

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::ImageReference;
use crate::resolver::ResolveError;

/// Terminal outcome of a single chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChapterOutcome {
    /// Every image fetched and assembled.
    Succeeded,
    /// At least one but not all images missing from the assembled unit.
    PartiallyFailed,
    /// Page-list fetch failed, all images failed, or assembly failed.
    Failed,
}

/// Final state of one chapter after its worker finished.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterReport {
    /// Reading-order ordinal.
    pub ordinal: u32,
    /// Display title.
    pub title: String,
    /// Terminal outcome.
    pub outcome: ChapterOutcome,
    /// Total images the chapter's page list declared (0 if the list itself
    /// could not be fetched).
    pub images_total: usize,
    /// Images present in the assembled output unit.
    pub images_fetched: usize,
    /// Image references with their final fetch states.
    pub images: Vec<ImageReference>,
    /// Final path of the assembled directory or archive, when one exists.
    pub output_path: Option<PathBuf>,
}

/// One recorded non-fatal failure, with chapter/image context.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// Ordinal of the affected chapter; `None` for run-scoped failures
    /// (e.g. metadata export).
    pub chapter: Option<u32>,
    /// Position index of the affected image, when the failure is
    /// image-scoped.
    pub image: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl FailureRecord {
    /// Records a chapter-scoped failure.
    #[must_use]
    pub fn chapter(ordinal: u32, message: impl Into<String>) -> Self {
        Self {
            chapter: Some(ordinal),
            image: None,
            message: message.into(),
        }
    }

    /// Records an image-scoped failure.
    #[must_use]
    pub fn image(ordinal: u32, index: usize, message: impl Into<String>) -> Self {
        Self {
            chapter: Some(ordinal),
            image: Some(index),
            message: message.into(),
        }
    }

    /// Records a run-scoped failure.
    #[must_use]
    pub fn run(message: impl Into<String>) -> Self {
        Self {
            chapter: None,
            image: None,
            message: message.into(),
        }
    }
}

/// Fatal errors that abort the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Chapter catalog could not be obtained within the retry budget.
    #[error("chapter discovery failed for {source_url}: {source}")]
    Discovery {
        /// Catalog location that could not be resolved.
        source_url: String,
        /// The final resolution error.
        #[source]
        source: ResolveError,
    },

    /// Output root could not be created or written.
    #[error("output root {path} is not writable: {source}")]
    OutputRoot {
        /// The configured output root.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled externally.
    #[error("run cancelled")]
    Cancelled,
}

/// Terminal state of the whole run.
#[derive(Debug)]
pub enum RunStatus {
    /// All selected chapters reached a terminal state; partial failures, if
    /// any, are enumerated in the chapter reports.
    Completed,
    /// Fatal error; chapters that had already reached a terminal state are
    /// preserved in the result.
    Failed(RunError),
}

impl RunStatus {
    /// Whether the run ended fatally.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// The final structured outcome of one orchestrated download run.
#[derive(Debug)]
pub struct RunResult {
    /// Terminal run state.
    pub status: RunStatus,
    /// Per-chapter reports in ascending ordinal order, regardless of
    /// completion order.
    pub chapters: Vec<ChapterReport>,
    /// Recorded non-fatal failures with chapter/image context.
    pub failures: Vec<FailureRecord>,
}

impl RunResult {
    /// Number of fully succeeded chapters.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(ChapterOutcome::Succeeded)
    }

    /// Number of partially failed chapters.
    #[must_use]
    pub fn partially_failed(&self) -> usize {
        self.count(ChapterOutcome::PartiallyFailed)
    }

    /// Number of failed chapters.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(ChapterOutcome::Failed)
    }

    /// Whether every chapter succeeded and the run completed.
    #[must_use]
    pub fn is_full_success(&self) -> bool {
        !self.status.is_fatal() && self.succeeded() == self.chapters.len()
    }

    fn count(&self, outcome: ChapterOutcome) -> usize {
        self.chapters
            .iter()
            .filter(|c| c.outcome == outcome)
            .count()
    }
}
