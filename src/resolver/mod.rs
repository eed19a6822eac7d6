//! Chapter discovery and range selection.
//!
//! Site knowledge lives behind the [`ChapterResolver`] trait: given a fetcher
//! (so discovery shares the run's retry policy and concurrency limit), a
//! resolver produces the ordered chapter catalog and, per chapter, the
//! ordered image URL list. The engine itself stays site-agnostic.
//!
//! The shipped [`JsonCatalogResolver`] consumes a paginated JSON catalog;
//! site-specific HTML resolvers implement the same trait.

mod json;

pub use json::JsonCatalogResolver;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::{Chapter, ImageReference, Work};
use crate::config::ChapterSelection;
use crate::fetch::{FetchError, Fetcher};

/// Errors raised while resolving a catalog or a chapter's page list.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The underlying fetch failed after the retry budget.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The response payload could not be parsed.
    #[error("malformed catalog document at {url}: {source}")]
    Parse {
        /// The URL whose payload failed to parse.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The configured source location is not a valid URL.
    #[error("invalid catalog location: {url}")]
    InvalidSource {
        /// The offending location string.
        url: String,
    },
}

impl ResolveError {
    /// Whether the failure was a cancellation rather than a real error.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_cancelled())
    }
}

/// Discovers the ordered chapter catalog for a work and the image URL list
/// of each chapter.
#[async_trait]
pub trait ChapterResolver: Send + Sync {
    /// Resolves the full ordered chapter catalog.
    ///
    /// Discovery may require multiple paginated fetches; each goes through
    /// the shared `fetcher`, so transient failures are retried with the
    /// run's backoff policy.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the catalog cannot be obtained after the
    /// retry budget. The caller treats this as fatal for the run.
    async fn resolve_catalog(&self, fetcher: &Fetcher) -> Result<Work, ResolveError>;

    /// Resolves one chapter's ordered image URL list.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] on fetch or parse failure. The caller treats
    /// this as fatal for that chapter only.
    async fn resolve_pages(
        &self,
        fetcher: &Fetcher,
        chapter: &Chapter,
    ) -> Result<Vec<ImageReference>, ResolveError>;
}

/// Applies the configured selection rule to a resolved catalog.
///
/// The catalog's chapters are assumed to be in ascending ordinal order (the
/// resolver contract). An explicit range is intersected with the catalog's
/// actual bounds; an empty intersection yields an empty list, which the
/// caller reports as a no-matching-chapters condition rather than an error.
#[must_use]
pub fn select_chapters(work: &Work, selection: ChapterSelection) -> Vec<Chapter> {
    match selection {
        ChapterSelection::All => work.chapters.clone(),
        ChapterSelection::Latest => work
            .chapters
            .iter()
            .max_by_key(|c| c.ordinal)
            .cloned()
            .into_iter()
            .collect(),
        ChapterSelection::Range { start, end } => work
            .chapters
            .iter()
            .filter(|c| start.is_none_or(|s| c.ordinal >= s))
            .filter(|c| end.is_none_or(|e| c.ordinal <= e))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog(ordinals: std::ops::RangeInclusive<u32>) -> Work {
        Work {
            id: "w1".to_string(),
            title: "Work".to_string(),
            source: "https://example.com/series/1".to_string(),
            chapters: ordinals
                .map(|ordinal| Chapter {
                    ordinal,
                    title: format!("Chapter {ordinal}"),
                    url: format!("https://example.com/ch/{ordinal}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_select_all_returns_whole_catalog() {
        let work = catalog(1..=10);
        let selected = select_chapters(&work, ChapterSelection::All);
        assert_eq!(selected.len(), 10);
    }

    #[test]
    fn test_select_latest_returns_highest_ordinal() {
        let work = catalog(1..=10);
        let selected = select_chapters(&work, ChapterSelection::Latest);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].ordinal, 10);
    }

    #[test]
    fn test_select_latest_on_empty_catalog() {
        let work = Work {
            chapters: Vec::new(),
            ..catalog(1..=1)
        };
        assert!(select_chapters(&work, ChapterSelection::Latest).is_empty());
    }

    #[test]
    fn test_select_range_intersects_catalog_bounds() {
        let work = catalog(1..=10);
        let selected = select_chapters(
            &work,
            ChapterSelection::Range {
                start: Some(2),
                end: Some(5),
            },
        );
        let ordinals: Vec<u32> = selected.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_select_range_clamps_to_catalog() {
        let work = catalog(5..=8);
        let selected = select_chapters(
            &work,
            ChapterSelection::Range {
                start: Some(1),
                end: Some(6),
            },
        );
        let ordinals: Vec<u32> = selected.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![5, 6]);
    }

    #[test]
    fn test_select_range_empty_intersection_is_empty_not_error() {
        let work = catalog(1..=10);
        let selected = select_chapters(
            &work,
            ChapterSelection::Range {
                start: Some(20),
                end: Some(30),
            },
        );
        assert!(selected.is_empty());
    }

    #[test]
    fn test_select_open_ended_range() {
        let work = catalog(1..=10);
        let selected = select_chapters(
            &work,
            ChapterSelection::Range {
                start: Some(8),
                end: None,
            },
        );
        let ordinals: Vec<u32> = selected.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![8, 9, 10]);
    }
}
