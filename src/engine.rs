//! The download engine: orchestrates discovery, per-chapter pipelines, and
//! final reporting for one run.
//!
//! A run moves through fixed phases: resolve the chapter catalog, apply the
//! selection rule, prepare the output root, then spawn one worker task per
//! selected chapter. Chapter workers overlap freely; the shared [`Fetcher`]
//! limiter is the only concurrency bound, so a single large chapter may use
//! the whole budget. The engine collects every worker's report and returns a
//! [`RunResult`] ordered by chapter ordinal regardless of completion order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::assemble::{chapter_basename, ChapterAssembler};
use crate::catalog::{Chapter, FetchState, PageImage};
use crate::codec::{sniff_extension, ImageCodec};
use crate::config::{DownloadConfig, OutputMode};
use crate::export::MetadataExporter;
use crate::fetch::{Fetcher, PageClient, RetryPolicy};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::report::{
    ChapterOutcome, ChapterReport, FailureRecord, RunError, RunResult, RunStatus,
};
use crate::resolver::{select_chapters, ChapterResolver};

/// Orchestrates one download run end to end.
pub struct DownloadEngine {
    config: DownloadConfig,
    fetcher: Arc<Fetcher>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
}

impl DownloadEngine {
    /// Creates an engine and the receiver half of its progress stream.
    ///
    /// The engine owns a fresh limiter sized to the configured concurrency
    /// and a fresh cancellation token; [`DownloadEngine::cancel_token`]
    /// exposes the token for signal handlers.
    #[must_use]
    pub fn new(
        config: DownloadConfig,
        client: Arc<dyn PageClient>,
        policy: RetryPolicy,
    ) -> (Self, tokio::sync::watch::Receiver<ProgressSnapshot>) {
        let cancel = CancellationToken::new();
        let fetcher = Arc::new(Fetcher::new(
            client,
            config.concurrency,
            policy,
            cancel.clone(),
        ));
        let (progress, rx) = ProgressTracker::new();
        (
            Self {
                config,
                fetcher,
                progress,
                cancel,
            },
            rx,
        )
    }

    /// Token that aborts the run when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the full download: discovery, selection, chapter pipelines,
    /// metadata export.
    ///
    /// Never returns an `Err`; all outcomes, fatal ones included, are
    /// carried in the [`RunResult`] so the caller always gets the chapter
    /// reports accumulated before any abort.
    pub async fn run(&self, resolver: Arc<dyn ChapterResolver>) -> RunResult {
        info!(source = %self.config.source, "resolving chapter catalog");
        let work = match resolver.resolve_catalog(&self.fetcher).await {
            Ok(work) => work,
            Err(e) if e.is_cancelled() => return fatal(RunError::Cancelled),
            Err(e) => {
                error!(source = %self.config.source, error = %e, "chapter discovery failed");
                return fatal(RunError::Discovery {
                    source_url: self.config.source.clone(),
                    source: e,
                });
            }
        };

        let selected = select_chapters(&work, self.config.selection);
        info!(
            work = %work.title,
            catalog = work.chapters.len(),
            selected = selected.len(),
            "chapter catalog resolved"
        );
        if selected.is_empty() {
            warn!("no chapters match the requested selection");
            return RunResult {
                status: RunStatus::Completed,
                chapters: Vec::new(),
                failures: Vec::new(),
            };
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_root).await {
            return fatal(RunError::OutputRoot {
                path: self.config.output_root.clone(),
                source: e,
            });
        }

        self.progress.set_chapters_total(selected.len());

        // Archive mode stores bytes as fetched; only images mode re-encodes.
        let codec = match self.config.output_mode {
            OutputMode::Images => Some(ImageCodec::new(
                self.config.image_format,
                self.config.quality,
            )),
            OutputMode::Archive => None,
        };
        let assembler = Arc::new(ChapterAssembler::for_mode(
            self.config.output_mode,
            &self.config.output_root,
        ));

        let mut handles = Vec::with_capacity(selected.len());
        for chapter in selected {
            let fetcher = Arc::clone(&self.fetcher);
            let resolver = Arc::clone(&resolver);
            let assembler = Arc::clone(&assembler);
            let progress = Arc::clone(&self.progress);
            handles.push(tokio::spawn(async move {
                process_chapter(chapter, &fetcher, resolver.as_ref(), codec, &assembler, &progress)
                    .await
            }));
        }

        let mut chapters = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((report, mut chapter_failures)) => {
                    chapters.push(report);
                    failures.append(&mut chapter_failures);
                }
                Err(e) => {
                    // A panicked worker loses its report but never the run.
                    error!(error = %e, "chapter worker aborted");
                    failures.push(FailureRecord::run(format!("chapter worker aborted: {e}")));
                }
            }
        }
        chapters.sort_by_key(|report| report.ordinal);

        let cancelled = self.cancel.is_cancelled();
        if self.config.export_metadata && !cancelled {
            let exporter =
                MetadataExporter::new(&self.config.output_root, self.config.metadata_format);
            if let Err(e) = exporter.export(&work, &chapters) {
                // Export failure never demotes an otherwise-successful run.
                warn!(error = %e, "metadata export failed");
                failures.push(FailureRecord::run(format!("metadata export failed: {e}")));
            }
        }

        let status = if cancelled {
            RunStatus::Failed(RunError::Cancelled)
        } else {
            RunStatus::Completed
        };
        RunResult {
            status,
            chapters,
            failures,
        }
    }
}

/// Builds a fatal result with no chapter reports.
fn fatal(error: RunError) -> RunResult {
    RunResult {
        status: RunStatus::Failed(error),
        chapters: Vec::new(),
        failures: Vec::new(),
    }
}

/// Runs one chapter's pipeline: page-list resolution, image fetches, optional
/// re-encoding, ordered assembly.
async fn process_chapter(
    chapter: Chapter,
    fetcher: &Fetcher,
    resolver: &dyn ChapterResolver,
    codec: Option<ImageCodec>,
    assembler: &ChapterAssembler,
    progress: &ProgressTracker,
) -> (ChapterReport, Vec<FailureRecord>) {
    let mut failures = Vec::new();

    let pages = match resolver.resolve_pages(fetcher, &chapter).await {
        Ok(pages) => pages,
        Err(e) => {
            warn!(chapter = chapter.ordinal, error = %e, "page list unavailable");
            failures.push(FailureRecord::chapter(
                chapter.ordinal,
                format!("page list unavailable: {e}"),
            ));
            progress.chapter_done();
            return (
                ChapterReport {
                    ordinal: chapter.ordinal,
                    title: chapter.title,
                    outcome: ChapterOutcome::Failed,
                    images_total: 0,
                    images_fetched: 0,
                    images: Vec::new(),
                    output_path: None,
                },
                failures,
            );
        }
    };

    let total = pages.len();
    progress.add_images_total(total);

    // Per-image futures run concurrently; the shared limiter is the only
    // bound. join_all preserves input order, so results come back already
    // ascending by position index.
    let fetches = pages.into_iter().map(|mut image| async move {
        image.state = FetchState::Fetching;
        let outcome = match fetcher.fetch(&image.url).await {
            Ok(bytes) => match codec {
                Some(codec) => codec.transform(&bytes).map(|encoded| PageImage {
                    index: image.index,
                    extension: codec.extension(),
                    bytes: encoded,
                }),
                None => Ok(PageImage {
                    index: image.index,
                    extension: sniff_extension(&bytes),
                    bytes,
                }),
            }
            .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        image.state = if outcome.is_ok() {
            FetchState::Fetched
        } else {
            FetchState::Failed
        };
        progress.image_done();
        (image, outcome)
    });
    let results = futures_util::future::join_all(fetches).await;

    let mut images = Vec::with_capacity(total);
    let mut references = Vec::with_capacity(total);
    for (reference, outcome) in results {
        match outcome {
            Ok(page) => images.push(page),
            Err(message) => {
                failures.push(FailureRecord::image(chapter.ordinal, reference.index, message));
            }
        }
        references.push(reference);
    }
    let fetched = images.len();

    let mut outcome = if fetched == total {
        ChapterOutcome::Succeeded
    } else if fetched > 0 {
        ChapterOutcome::PartiallyFailed
    } else {
        ChapterOutcome::Failed
    };

    // A cancelled chapter is never assembled; a failed one has nothing to
    // assemble.
    let mut output_path = None;
    if outcome != ChapterOutcome::Failed && !fetcher.cancel_token().is_cancelled() {
        let name = chapter_basename(chapter.ordinal, &chapter.title);
        match assembler.assemble(&name, &images) {
            Ok(path) => output_path = Some(path),
            Err(e) => {
                warn!(chapter = chapter.ordinal, error = %e, "assembly failed");
                failures.push(FailureRecord::chapter(
                    chapter.ordinal,
                    format!("assembly failed: {e}"),
                ));
                outcome = ChapterOutcome::Failed;
            }
        }
    }

    info!(
        chapter = chapter.ordinal,
        fetched,
        total,
        outcome = ?outcome,
        "chapter finished"
    );
    progress.chapter_done();
    (
        ChapterReport {
            ordinal: chapter.ordinal,
            title: chapter.title,
            outcome,
            images_total: total,
            images_fetched: fetched,
            images: references,
            output_path,
        },
        failures,
    )
}
