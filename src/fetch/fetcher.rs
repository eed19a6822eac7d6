//! Concurrency-bounded fetch with retry.
//!
//! [`Fetcher`] is shared by every worker in a run: catalog-page, page-list,
//! and image fetches all acquire a permit from the same semaphore, so a
//! single large chapter may legitimately consume the whole concurrency
//! budget. The permit covers only the in-flight request; backoff sleeps
//! between attempts do not hold a slot.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::PageClient;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::FetchError;

/// Retrieves one resource at a time, bounded by the shared limiter, with
/// retry/backoff on transient failures.
pub struct Fetcher {
    client: Arc<dyn PageClient>,
    limiter: Arc<Semaphore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    /// Creates a fetcher with a fresh limiter of `concurrency` slots.
    ///
    /// `concurrency` is trusted here; it was validated at configuration
    /// construction.
    #[must_use]
    pub fn new(
        client: Arc<dyn PageClient>,
        concurrency: usize,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            limiter: Arc::new(Semaphore::new(concurrency)),
            policy,
            cancel,
        }
    }

    /// The cancellation token observed by every fetch.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Number of limiter slots currently free. Test observability hook.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Fetches `url`, retrying transient failures per the policy.
    ///
    /// Suspends while the limiter is at capacity. Observes cancellation
    /// before acquiring a slot and during every backoff sleep; a cancelled
    /// fetch fails fast with [`FetchError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns the final [`FetchError`] once the attempt budget is exhausted
    /// or a permanent failure is hit.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = {
                // Biased so the cancellation arm is checked first; an
                // already-cancelled run must never start a new fetch even
                // when a permit is free.
                let _permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(FetchError::cancelled(url)),
                    permit = self.limiter.acquire() => {
                        permit.map_err(|_| FetchError::cancelled(url))?
                    }
                };

                debug!(url, attempt, "attempting fetch");
                match self.client.get(url).await {
                    Ok(bytes) => return Ok(bytes),
                    Err(e) => e,
                }
                // Permit released here so backoff never holds a slot.
            };

            if error.is_cancelled() {
                return Err(error);
            }

            match self.policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        url,
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(FetchError::cancelled(url)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, %reason, "not retrying fetch");
                    return Err(error);
                }
            }
        }
    }
}
