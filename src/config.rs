//! Run configuration with single-point validation.
//!
//! All user-supplied options are collected into [`DownloadOptions`] by the
//! command surface and validated exactly once by
//! [`DownloadConfig::from_options`]. The engine only ever sees a validated,
//! immutable [`DownloadConfig`]; none of the option errors below can occur
//! mid-run.

use std::path::PathBuf;

use thiserror::Error;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default JPEG quality if not specified.
pub const DEFAULT_QUALITY: u8 = 80;

/// Validation errors raised when constructing a [`DownloadConfig`].
///
/// Each invalid option maps to exactly one variant so front-ends can match
/// on the discriminant instead of parsing message text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Concurrency outside the allowed range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Quality not a multiple of 10 within 40-100.
    #[error("invalid quality value {value}: must be a multiple of 10 between 40 and 100")]
    InvalidQuality {
        /// The invalid value that was provided.
        value: u8,
    },

    /// Explicit chapter range with start greater than end.
    #[error("invalid chapter range: start {start} is greater than end {end}")]
    InvalidRange {
        /// Requested first ordinal.
        start: u32,
        /// Requested last ordinal.
        end: u32,
    },

    /// `latest` combined with an explicit start/end range.
    #[error("latest-chapter selection cannot be combined with an explicit start/end range")]
    LatestWithRange,

    /// Image-only option supplied together with archive output mode.
    #[error("option `{option}` only applies to image output mode, not archive mode")]
    OptionRequiresImagesMode {
        /// Name of the offending option.
        option: &'static str,
    },
}

/// Which chapters of the catalog to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSelection {
    /// Every chapter in the catalog.
    All,
    /// Only the chapter with the highest ordinal.
    Latest,
    /// Inclusive ordinal range, open-ended on either side.
    ///
    /// A missing bound falls back to the catalog's own bound at selection
    /// time.
    Range {
        /// First ordinal to include, if bounded.
        start: Option<u32>,
        /// Last ordinal to include, if bounded.
        end: Option<u32>,
    },
}

/// How each chapter is materialized on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One directory of image files per chapter.
    Images,
    /// One `.cbz` archive per chapter, images stored as fetched.
    Archive,
}

/// Target encoding for images in [`OutputMode::Images`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG, re-encoded at the configured quality.
    Jpg,
    /// PNG, lossless.
    Png,
}

impl ImageFormat {
    /// File extension for this format, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Which metadata report files to write after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// `metadata.json` only.
    Json,
    /// `metadata.txt` only.
    Text,
    /// Both files.
    Both,
}

/// Raw, unvalidated options as collected by a front-end.
///
/// `quality` and `image_format` stay `Option` here so validation can tell
/// "explicitly set" apart from "defaulted" when rejecting image-only options
/// in archive mode.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Catalog location of the work to download.
    pub source: String,
    /// Download only the latest chapter.
    pub latest: bool,
    /// First chapter ordinal of an explicit range.
    pub start: Option<u32>,
    /// Last chapter ordinal of an explicit range.
    pub end: Option<u32>,
    /// Root directory for all output units.
    pub output_root: PathBuf,
    /// Directory-of-images or one archive per chapter.
    pub output_mode: OutputMode,
    /// Target image format (images mode only).
    pub image_format: Option<ImageFormat>,
    /// JPEG quality (images mode only).
    pub quality: Option<u8>,
    /// Maximum simultaneous fetches.
    pub concurrency: usize,
    /// Write a metadata report after the run.
    pub export_metadata: bool,
    /// Report format(s) to write.
    pub metadata_format: MetadataFormat,
}

/// Validated, immutable configuration for one download run.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Catalog location of the work to download.
    pub source: String,
    /// Which chapters to download.
    pub selection: ChapterSelection,
    /// Root directory for all output units.
    pub output_root: PathBuf,
    /// Directory-of-images or one archive per chapter.
    pub output_mode: OutputMode,
    /// Target image format; only consulted in images mode.
    pub image_format: ImageFormat,
    /// JPEG quality; only consulted in images mode.
    pub quality: u8,
    /// Maximum simultaneous fetches across the whole run.
    pub concurrency: usize,
    /// Write a metadata report after the run.
    pub export_metadata: bool,
    /// Report format(s) to write.
    pub metadata_format: MetadataFormat,
}

impl DownloadConfig {
    /// Validates raw options into a run configuration.
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`ConfigError`]:
    /// - [`ConfigError::InvalidConcurrency`] outside 1-100
    /// - [`ConfigError::LatestWithRange`] when `latest` is combined with
    ///   `start` or `end`
    /// - [`ConfigError::InvalidRange`] when `start > end`
    /// - [`ConfigError::OptionRequiresImagesMode`] when `quality` or
    ///   `image_format` is set in archive mode
    /// - [`ConfigError::InvalidQuality`] when quality is not a multiple of
    ///   10 in 40-100
    pub fn from_options(options: DownloadOptions) -> Result<Self, ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: options.concurrency,
            });
        }

        let selection = match (options.latest, options.start, options.end) {
            (true, None, None) => ChapterSelection::Latest,
            (true, _, _) => return Err(ConfigError::LatestWithRange),
            (false, None, None) => ChapterSelection::All,
            (false, start, end) => {
                if let (Some(s), Some(e)) = (start, end) {
                    if s > e {
                        return Err(ConfigError::InvalidRange { start: s, end: e });
                    }
                }
                ChapterSelection::Range { start, end }
            }
        };

        if options.output_mode == OutputMode::Archive {
            if options.quality.is_some() {
                return Err(ConfigError::OptionRequiresImagesMode { option: "quality" });
            }
            if options.image_format.is_some() {
                return Err(ConfigError::OptionRequiresImagesMode {
                    option: "image-format",
                });
            }
        }

        let quality = options.quality.unwrap_or(DEFAULT_QUALITY);
        if !(40..=100).contains(&quality) || quality % 10 != 0 {
            return Err(ConfigError::InvalidQuality { value: quality });
        }

        Ok(Self {
            source: options.source,
            selection,
            output_root: options.output_root,
            output_mode: options.output_mode,
            image_format: options.image_format.unwrap_or(ImageFormat::Jpg),
            quality,
            concurrency: options.concurrency,
            export_metadata: options.export_metadata,
            metadata_format: options.metadata_format,
        })
    }
}
