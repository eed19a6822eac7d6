//! Webtoon Download Engine
//!
//! This library orchestrates whole-work chapter downloads: it discovers a
//! work's chapter catalog, selects the requested chapters, fetches their
//! images under a shared concurrency limit with retry, optionally re-encodes
//! them, and assembles each chapter into an ordered directory or `.cbz`
//! archive.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Option validation into an immutable run configuration
//! - [`resolver`] - Chapter catalog discovery and range selection
//! - [`fetch`] - Concurrency-bounded HTTP fetch with retry/backoff
//! - [`codec`] - Image re-encoding for directory output
//! - [`assemble`] - Ordered per-chapter output assembly
//! - [`export`] - Post-run metadata reports
//! - [`engine`] - The run orchestrator tying it all together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assemble;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod engine;
pub mod export;
pub mod fetch;
pub mod progress;
pub mod report;
pub mod resolver;

// Re-export commonly used types
pub use catalog::{Chapter, ImageReference, PageImage, Work};
pub use config::{
    ChapterSelection, ConfigError, DEFAULT_CONCURRENCY, DownloadConfig, DownloadOptions,
    ImageFormat, MetadataFormat, OutputMode,
};
pub use engine::DownloadEngine;
pub use fetch::{
    DEFAULT_MAX_ATTEMPTS, FailureType, FetchError, Fetcher, HttpClient, PageClient,
    RetryDecision, RetryPolicy, classify_error,
};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use report::{ChapterOutcome, ChapterReport, FailureRecord, RunError, RunResult, RunStatus};
pub use resolver::{ChapterResolver, JsonCatalogResolver, ResolveError, select_chapters};
