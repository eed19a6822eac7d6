//! Image re-encoding for directory output mode.
//!
//! Fetched payloads are decoded from whatever the source served (the `image`
//! crate sniffs the format) and re-encoded to the configured target format.
//! The transform is deterministic for identical inputs. Archive mode never
//! constructs a codec; images are stored as fetched.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

use crate::config::ImageFormat;

/// Errors raised while re-encoding a single image.
///
/// Either variant demotes to a per-image failure in the chapter accounting;
/// codec errors are never fatal for the run.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The fetched payload is not a decodable image.
    #[error("failed to decode image payload: {source}")]
    Decode {
        /// The underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// Re-encoding to the target format failed.
    #[error("failed to encode image to {format}: {source}")]
    Encode {
        /// Target extension.
        format: &'static str,
        /// The underlying encode error.
        #[source]
        source: image::ImageError,
    },
}

/// Re-encodes raw image payloads to a fixed target format and quality.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    format: ImageFormat,
    quality: u8,
}

impl ImageCodec {
    /// Creates a codec for the given target format.
    ///
    /// `quality` only affects JPEG output; it was validated at configuration
    /// construction (multiple of 10 in 40-100).
    #[must_use]
    pub fn new(format: ImageFormat, quality: u8) -> Self {
        Self { format, quality }
    }

    /// File extension produced by this codec, without the dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Re-encodes `bytes` to the target format.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the payload cannot be decoded or the
    /// target encoding fails.
    pub fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let img = image::load_from_memory(bytes).map_err(|source| CodecError::Decode { source })?;

        let mut out = Vec::new();
        match self.format {
            ImageFormat::Jpg => {
                let rgb = img.to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|source| CodecError::Encode {
                        format: "jpg",
                        source,
                    })?;
            }
            ImageFormat::Png => {
                img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
                    .map_err(|source| CodecError::Encode {
                        format: "png",
                        source,
                    })?;
            }
        }
        Ok(out)
    }
}

/// Best-effort extension for a payload stored as fetched (archive mode).
///
/// Falls back to `jpg` when the format cannot be sniffed; the bytes are
/// stored untouched either way.
#[must_use]
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::WebP) => "webp",
        _ => "jpg",
    }
}
