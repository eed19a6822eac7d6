//! Site-agnostic resolver for paginated JSON catalogs.
//!
//! Catalog documents are fetched from the configured source URL, page by
//! page, with the page number carried in a `page` query parameter:
//!
//! ```json
//! {
//!   "id": "tower-of-god",
//!   "title": "Tower of God",
//!   "chapters": [
//!     { "ordinal": 1, "title": "1F", "url": "/chapters/1" }
//!   ],
//!   "next_page": 2
//! }
//! ```
//!
//! A `null` or absent `next_page` ends discovery. Each chapter URL points to
//! a page-list document:
//!
//! ```json
//! { "images": ["/img/1-0.jpg", "/img/1-1.jpg"] }
//! ```
//!
//! Relative URLs are resolved against the catalog location.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{ChapterResolver, ResolveError};
use crate::catalog::{Chapter, ImageReference, Work};
use crate::fetch::Fetcher;

/// One page of the catalog document.
#[derive(Debug, Deserialize)]
struct CatalogPage {
    id: String,
    title: String,
    #[serde(default)]
    chapters: Vec<ChapterStub>,
    #[serde(default)]
    next_page: Option<u32>,
}

/// One chapter entry in a catalog page.
#[derive(Debug, Deserialize)]
struct ChapterStub {
    ordinal: u32,
    title: String,
    url: String,
}

/// One chapter's page-list document.
#[derive(Debug, Deserialize)]
struct PageList {
    images: Vec<String>,
}

/// Resolver for the paginated JSON catalog format.
#[derive(Debug, Clone)]
pub struct JsonCatalogResolver {
    source: String,
}

impl JsonCatalogResolver {
    /// Creates a resolver for the catalog at `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    fn base_url(&self) -> Result<Url, ResolveError> {
        Url::parse(&self.source).map_err(|_| ResolveError::InvalidSource {
            url: self.source.clone(),
        })
    }

    fn page_url(&self, base: &Url, page: u32) -> Url {
        let mut url = base.clone();
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        url
    }

    /// Resolves a possibly-relative URL against the catalog base.
    fn absolute(base: &Url, candidate: &str) -> String {
        match base.join(candidate) {
            Ok(url) => url.to_string(),
            // Leave it as-is; the fetch will report the invalid URL with
            // proper context.
            Err(_) => candidate.to_string(),
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(url: &Url, bytes: &[u8]) -> Result<T, ResolveError> {
        serde_json::from_slice(bytes).map_err(|source| ResolveError::Parse {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ChapterResolver for JsonCatalogResolver {
    async fn resolve_catalog(&self, fetcher: &Fetcher) -> Result<Work, ResolveError> {
        let base = self.base_url()?;

        let mut work: Option<Work> = None;
        let mut page = 1u32;

        loop {
            let url = self.page_url(&base, page);
            debug!(%url, page, "fetching catalog page");

            let bytes = fetcher.fetch(url.as_str()).await?;
            let doc: CatalogPage = Self::parse(&url, &bytes)?;

            let chapters = doc.chapters.into_iter().map(|stub| Chapter {
                ordinal: stub.ordinal,
                title: stub.title,
                url: Self::absolute(&base, &stub.url),
            });

            match &mut work {
                Some(work) => work.chapters.extend(chapters),
                None => {
                    work = Some(Work {
                        id: doc.id,
                        title: doc.title,
                        source: self.source.clone(),
                        chapters: chapters.collect(),
                    });
                }
            }

            match doc.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        // Catalog contract: ascending ordinal order, regardless of how the
        // pages were split.
        let mut work = work.unwrap_or_else(|| Work {
            id: String::new(),
            title: String::new(),
            source: self.source.clone(),
            chapters: Vec::new(),
        });
        work.chapters.sort_by_key(|c| c.ordinal);

        info!(
            work = %work.title,
            chapters = work.chapters.len(),
            "catalog resolved"
        );
        Ok(work)
    }

    async fn resolve_pages(
        &self,
        fetcher: &Fetcher,
        chapter: &Chapter,
    ) -> Result<Vec<ImageReference>, ResolveError> {
        let base = self.base_url()?;
        let url = Url::parse(&chapter.url).unwrap_or_else(|_| base.clone());

        let bytes = fetcher.fetch(&chapter.url).await?;
        let list: PageList = Self::parse(&url, &bytes)?;

        debug!(
            ordinal = chapter.ordinal,
            images = list.images.len(),
            "page list resolved"
        );

        Ok(list
            .images
            .iter()
            .enumerate()
            .map(|(index, image_url)| ImageReference::new(index, Self::absolute(&url, image_url)))
            .collect())
    }
}
