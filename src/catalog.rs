//! Catalog data model: works, chapters, and page image references.
//!
//! A [`Work`] is produced once by a resolver and is immutable afterwards.
//! Each [`Chapter`] is owned exclusively by the single worker task processing
//! it; nothing here needs locking.

use serde::{Deserialize, Serialize};

/// The top-level titled item being downloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    /// Source-assigned identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Catalog location the work was resolved from.
    pub source: String,
    /// Chapters in ascending ordinal order.
    pub chapters: Vec<Chapter>,
}

/// One ordered sub-unit of a [`Work`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Reading-order ordinal, strictly increasing within a work.
    pub ordinal: u32,
    /// Display title.
    pub title: String,
    /// Location of this chapter's page list.
    pub url: String,
}

/// Fetch lifecycle of a single page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchState {
    /// Not yet attempted.
    Pending,
    /// Request in flight.
    Fetching,
    /// Payload retrieved.
    Fetched,
    /// Gave up: permanent failure or retry budget exhausted.
    Failed,
}

/// A reference to one page image within a chapter.
///
/// `index` is the authoritative page-ordering key: output files and archive
/// entries are ordered by it regardless of fetch completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReference {
    /// 0-based position within the chapter.
    pub index: usize,
    /// Source URL of the image payload.
    pub url: String,
    /// Current fetch state.
    pub state: FetchState,
}

impl ImageReference {
    /// Creates a pending reference at the given position.
    #[must_use]
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            state: FetchState::Pending,
        }
    }
}

/// A fetched image payload on its way to assembly.
///
/// Produced by the fetch pipeline, consumed exactly once by the assembler;
/// the buffer is not retained afterwards.
#[derive(Debug)]
pub struct PageImage {
    /// 0-based position within the chapter.
    pub index: usize,
    /// File extension for the stored form, without the dot.
    pub extension: &'static str,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}
