//! Directory output: one folder of image files per chapter.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::{page_filename, AssembleError};
use crate::catalog::PageImage;

/// Writes a chapter's images into a per-chapter directory under the output
/// root, one file per image, named by zero-padded position index.
pub struct DirectoryAssembler {
    root: PathBuf,
}

impl DirectoryAssembler {
    /// Creates an assembler rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes the chapter directory and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Io`] on directory creation or file write
    /// failure.
    pub fn assemble(
        &self,
        chapter_name: &str,
        images: &[PageImage],
    ) -> Result<PathBuf, AssembleError> {
        let dir = self.root.join(chapter_name);
        fs::create_dir_all(&dir).map_err(|e| AssembleError::io(&dir, e))?;

        for image in images {
            let path = dir.join(page_filename(image.index, image.extension));
            fs::write(&path, &image.bytes).map_err(|e| AssembleError::io(&path, e))?;
        }

        debug!(dir = %dir.display(), images = images.len(), "chapter directory written");
        Ok(dir)
    }
}
