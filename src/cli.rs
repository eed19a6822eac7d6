//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use webtoon_dl_core::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadOptions, ImageFormat, MetadataFormat,
    OutputMode,
};

/// Download a work's chapters as image directories or CBZ archives.
///
/// Resolves the work's chapter catalog, selects the requested chapters, and
/// fetches their images concurrently with retry. Each chapter becomes one
/// directory of images or one `.cbz` archive under the output directory.
#[derive(Parser, Debug)]
#[command(name = "webtoon-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Catalog location of the work to download
    pub source: String,

    /// Download only the latest chapter
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub latest: bool,

    /// First chapter ordinal to download (inclusive)
    #[arg(long)]
    pub start: Option<u32>,

    /// Last chapter ordinal to download (inclusive)
    #[arg(long)]
    pub end: Option<u32>,

    /// Output directory for chapter units and metadata
    #[arg(short = 'o', long = "out", default_value = ".")]
    pub out: PathBuf,

    /// Output form for each chapter
    #[arg(long = "save-as", value_enum, default_value_t = SaveAs::Images)]
    pub save_as: SaveAs,

    /// Target image format (images mode only)
    #[arg(long = "image-format", value_enum)]
    pub image_format: Option<ImageFormatArg>,

    /// JPEG quality, multiple of 10 in 40-100 (images mode only)
    #[arg(long)]
    pub quality: Option<u8>,

    /// Maximum concurrent fetches (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Maximum attempts per fetch for transient failures (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Write a metadata report after the run
    #[arg(long = "export-metadata")]
    pub export_metadata: bool,

    /// Metadata report format(s)
    #[arg(long = "export-format", value_enum, default_value_t = ExportFormat::Json)]
    pub export_format: ExportFormat,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output form for each downloaded chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SaveAs {
    /// One directory of image files per chapter
    Images,
    /// One `.cbz` archive per chapter
    Cbz,
}

/// Target image format for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageFormatArg {
    Jpg,
    Png,
}

/// Metadata report format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Text,
    Both,
}

impl Args {
    /// Collects the parsed flags into unvalidated download options.
    pub fn into_options(self) -> DownloadOptions {
        DownloadOptions {
            source: self.source,
            latest: self.latest,
            start: self.start,
            end: self.end,
            output_root: self.out,
            output_mode: match self.save_as {
                SaveAs::Images => OutputMode::Images,
                SaveAs::Cbz => OutputMode::Archive,
            },
            image_format: self.image_format.map(|f| match f {
                ImageFormatArg::Jpg => ImageFormat::Jpg,
                ImageFormatArg::Png => ImageFormat::Png,
            }),
            quality: self.quality,
            concurrency: usize::from(self.concurrency),
            export_metadata: self.export_metadata,
            metadata_format: match self.export_format {
                ExportFormat::Json => MetadataFormat::Json,
                ExportFormat::Text => MetadataFormat::Text,
                ExportFormat::Both => MetadataFormat::Both,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "https://example.com/series/1";

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["webtoon-dl", SOURCE]).unwrap();
        assert_eq!(args.source, SOURCE);
        assert!(!args.latest);
        assert_eq!(args.save_as, SaveAs::Images);
        assert_eq!(args.concurrency, 10); // DEFAULT_CONCURRENCY
        assert_eq!(args.max_attempts, 3); // DEFAULT_MAX_ATTEMPTS
        assert_eq!(args.export_format, ExportFormat::Json);
    }

    #[test]
    fn test_cli_source_is_required() {
        let result = Args::try_parse_from(["webtoon-dl"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_latest_conflicts_with_range() {
        let result = Args::try_parse_from(["webtoon-dl", SOURCE, "--latest", "--start", "3"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_save_as_cbz_maps_to_archive_mode() {
        let args = Args::try_parse_from(["webtoon-dl", SOURCE, "--save-as", "cbz"]).unwrap();
        let options = args.into_options();
        assert_eq!(options.output_mode, OutputMode::Archive);
    }

    #[test]
    fn test_cli_range_flags_collected() {
        let args =
            Args::try_parse_from(["webtoon-dl", SOURCE, "--start", "2", "--end", "5"]).unwrap();
        let options = args.into_options();
        assert_eq!(options.start, Some(2));
        assert_eq!(options.end, Some(5));
    }

    #[test]
    fn test_cli_image_format_and_quality_stay_optional() {
        let args = Args::try_parse_from(["webtoon-dl", SOURCE]).unwrap();
        let options = args.into_options();
        assert_eq!(options.image_format, None);
        assert_eq!(options.quality, None);

        let args = Args::try_parse_from([
            "webtoon-dl",
            SOURCE,
            "--image-format",
            "png",
            "--quality",
            "70",
        ])
        .unwrap();
        let options = args.into_options();
        assert_eq!(options.image_format, Some(ImageFormat::Png));
        assert_eq!(options.quality, Some(70));
    }

    #[test]
    fn test_cli_concurrency_range_enforced() {
        let args = Args::try_parse_from(["webtoon-dl", SOURCE, "-c", "100"]).unwrap();
        assert_eq!(args.concurrency, 100);

        let result = Args::try_parse_from(["webtoon-dl", SOURCE, "-c", "0"]);
        assert!(result.is_err());

        let result = Args::try_parse_from(["webtoon-dl", SOURCE, "-c", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_export_flags() {
        let args = Args::try_parse_from([
            "webtoon-dl",
            SOURCE,
            "--export-metadata",
            "--export-format",
            "both",
        ])
        .unwrap();
        let options = args.into_options();
        assert!(options.export_metadata);
        assert_eq!(options.metadata_format, MetadataFormat::Both);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        // --help causes early exit, so we check it returns an error with Help kind
        let result = Args::try_parse_from(["webtoon-dl", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["webtoon-dl", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
