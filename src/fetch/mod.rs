//! Concurrency-bounded resource fetching with retry and backoff.
//!
//! The pipeline is: [`Fetcher`] acquires a slot from the shared limiter,
//! performs the GET through a [`PageClient`], classifies failures via
//! [`classify_error`], and retries transients per the [`RetryPolicy`].

mod client;
mod error;
mod fetcher;
mod retry;

pub use client::{HttpClient, PageClient};
pub use error::FetchError;
pub use fetcher::Fetcher;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};
