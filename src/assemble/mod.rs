//! Ordered output assembly: a directory of images or one archive per
//! chapter.
//!
//! Both variants consume a chapter's ordered, successfully fetched images.
//! File names and archive entry names encode the position index so page
//! order survives regardless of fetch completion order. Images that failed
//! fetch or re-encoding are simply absent; the chapter report carries the
//! omission.

mod archive;
mod directory;

pub use archive::ArchiveAssembler;
pub use directory::DirectoryAssembler;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::catalog::PageImage;
use crate::config::OutputMode;

/// Errors raised while assembling a chapter's output unit.
///
/// Assembly errors are fatal for the affected chapter only; the output root
/// itself is validated before any chapter work starts.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// File system error while writing the output unit.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Archive-level error from the zip writer.
    #[error("archive error writing {path}: {source}")]
    Archive {
        /// The archive path being written.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl AssembleError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Output-mode dispatch for chapter assembly.
///
/// Enum dispatch instead of a trait object: there are exactly two variants
/// and both are owned by the engine.
pub enum ChapterAssembler {
    /// One directory of image files per chapter.
    Directory(DirectoryAssembler),
    /// One `.cbz` archive per chapter.
    Archive(ArchiveAssembler),
}

impl ChapterAssembler {
    /// Creates the assembler for the configured output mode, rooted at
    /// `output_root`.
    #[must_use]
    pub fn for_mode(mode: OutputMode, output_root: &Path) -> Self {
        match mode {
            OutputMode::Images => Self::Directory(DirectoryAssembler::new(output_root)),
            OutputMode::Archive => Self::Archive(ArchiveAssembler::new(output_root)),
        }
    }

    /// Assembles a chapter's images into its output unit and returns the
    /// final path.
    ///
    /// `images` must be sorted by ascending position index.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] on any file system or archive failure; no
    /// partial archive is left at the final path.
    pub fn assemble(
        &self,
        chapter_name: &str,
        images: &[PageImage],
    ) -> Result<PathBuf, AssembleError> {
        match self {
            Self::Directory(assembler) => assembler.assemble(chapter_name, images),
            Self::Archive(assembler) => assembler.assemble(chapter_name, images),
        }
    }
}

/// Builds a chapter's on-disk base name from its ordinal and title.
///
/// The zero-padded ordinal prefix keeps directory listings in reading order.
#[must_use]
pub fn chapter_basename(ordinal: u32, title: &str) -> String {
    let safe = sanitize_title(title);
    if safe.is_empty() {
        format!("{ordinal:04}")
    } else {
        format!("{ordinal:04}-{safe}")
    }
}

/// Replaces path-hostile characters so titles are safe as file names.
fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// File name for one page image, zero-padded so lexical order equals page
/// order.
#[must_use]
pub fn page_filename(index: usize, extension: &str) -> String {
    format!("{index:04}.{extension}")
}
