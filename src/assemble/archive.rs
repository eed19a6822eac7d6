//! Archive output: one `.cbz` per chapter, assembled atomically.
//!
//! The zip is written to a temporary file in the output root and persisted
//! to its final name only after `finish()` succeeds. A crash, error, or
//! cancellation mid-write leaves nothing at the final path; the temp file is
//! cleaned up on drop.

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{page_filename, AssembleError};
use crate::catalog::PageImage;

/// Streams a chapter's images, in position order, into one `.cbz` archive.
pub struct ArchiveAssembler {
    root: PathBuf,
}

impl ArchiveAssembler {
    /// Creates an assembler rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes the chapter archive and returns its final path.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] on temp-file, zip, or rename failure. On
    /// any error the temporary file is discarded and the final path is left
    /// untouched.
    pub fn assemble(
        &self,
        chapter_name: &str,
        images: &[PageImage],
    ) -> Result<PathBuf, AssembleError> {
        let final_path = self.root.join(format!("{chapter_name}.cbz"));

        // Temp file in the same directory so the final rename never crosses
        // a filesystem boundary.
        let tmp = NamedTempFile::new_in(&self.root)
            .map_err(|e| AssembleError::io(&self.root, e))?;

        let mut writer = ZipWriter::new(tmp);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for image in images {
            let entry = page_filename(image.index, image.extension);
            writer
                .start_file(&entry, options)
                .map_err(|e| AssembleError::Archive {
                    path: final_path.clone(),
                    source: e,
                })?;
            writer
                .write_all(&image.bytes)
                .map_err(|e| AssembleError::io(&final_path, e))?;
        }

        let tmp = writer.finish().map_err(|e| AssembleError::Archive {
            path: final_path.clone(),
            source: e,
        })?;

        tmp.persist(&final_path)
            .map_err(|e| AssembleError::io(&final_path, e.error))?;

        debug!(path = %final_path.display(), images = images.len(), "chapter archive written");
        Ok(final_path)
    }
}
