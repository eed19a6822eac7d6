//! Metadata export: a structured and/or plain-text report of what was
//! fetched.
//!
//! Runs once after assembly, over the final catalog state including failure
//! markers. Export failure is reported to the caller but never invalidates
//! an otherwise-successful run.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::Work;
use crate::config::MetadataFormat;
use crate::report::{ChapterOutcome, ChapterReport};

/// File name of the structured report.
const JSON_FILENAME: &str = "metadata.json";

/// File name of the plain-text report.
const TEXT_FILENAME: &str = "metadata.txt";

/// Errors raised while writing the metadata report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File system error while writing a report file.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// The report path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The report could not be serialized.
    #[error("failed to serialize metadata: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Serialized shape of the structured report.
#[derive(Debug, Serialize)]
struct WorkMetadata<'a> {
    title: &'a str,
    id: &'a str,
    source: &'a str,
    chapters: Vec<ChapterMetadata<'a>>,
}

#[derive(Debug, Serialize)]
struct ChapterMetadata<'a> {
    ordinal: u32,
    title: &'a str,
    images_total: usize,
    images_fetched: usize,
    outcome: ChapterOutcome,
}

/// Writes the configured metadata report file(s) under the output root.
pub struct MetadataExporter {
    root: PathBuf,
    format: MetadataFormat,
}

impl MetadataExporter {
    /// Creates an exporter writing under `root` in the given format(s).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, format: MetadataFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Writes the report file(s) and returns their paths.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on serialization or write failure. The caller
    /// records the failure without demoting the run.
    pub fn export(
        &self,
        work: &Work,
        reports: &[ChapterReport],
    ) -> Result<Vec<PathBuf>, ExportError> {
        let mut written = Vec::new();

        if matches!(self.format, MetadataFormat::Json | MetadataFormat::Both) {
            written.push(self.write_json(work, reports)?);
        }
        if matches!(self.format, MetadataFormat::Text | MetadataFormat::Both) {
            written.push(self.write_text(work, reports)?);
        }

        info!(files = written.len(), "metadata exported");
        Ok(written)
    }

    fn write_json(&self, work: &Work, reports: &[ChapterReport]) -> Result<PathBuf, ExportError> {
        let metadata = WorkMetadata {
            title: &work.title,
            id: &work.id,
            source: &work.source,
            chapters: reports
                .iter()
                .map(|r| ChapterMetadata {
                    ordinal: r.ordinal,
                    title: &r.title,
                    images_total: r.images_total,
                    images_fetched: r.images_fetched,
                    outcome: r.outcome,
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|source| ExportError::Serialize { source })?;

        let path = self.root.join(JSON_FILENAME);
        write_report(&path, &json)?;
        Ok(path)
    }

    fn write_text(&self, work: &Work, reports: &[ChapterReport]) -> Result<PathBuf, ExportError> {
        let mut out = String::new();
        let _ = writeln!(out, "Title:  {}", work.title);
        let _ = writeln!(out, "Id:     {}", work.id);
        let _ = writeln!(out, "Source: {}", work.source);
        let _ = writeln!(out);

        for report in reports {
            let outcome = match report.outcome {
                ChapterOutcome::Succeeded => "ok",
                ChapterOutcome::PartiallyFailed => "partial",
                ChapterOutcome::Failed => "failed",
            };
            let _ = writeln!(
                out,
                "chapter {:>4}  {:<40}  {}/{} images  [{}]",
                report.ordinal, report.title, report.images_fetched, report.images_total, outcome
            );
        }

        let path = self.root.join(TEXT_FILENAME);
        write_report(&path, &out)?;
        Ok(path)
    }
}

fn write_report(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
