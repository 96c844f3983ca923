//! Fetch abstraction and retry policy for per-item scraping.
//!
//! The dispatcher (see [`crate::dispatch`]) runs many fetches concurrently;
//! this module defines the seam it runs them through:
//! - [`FetchTask`]: async fetch of one work item
//! - [`Fetched`]: the two terminal successes, rows or no-content
//! - [`RetryPolicy`]: exponential backoff with jitter for transient failures
//!
//! # Failure classification
//!
//! A fetch has exactly three results, and the distinction drives retry
//! behavior:
//! - `Ok(Fetched::Rows(_))`: content found, done.
//! - `Ok(Fetched::NoContent)`: the page loaded but the target structure is
//!   absent. This is a successful empty result and is never retried.
//! - `Err(_)`: transient failure (network, render, wait timeout). Retried
//!   with backoff up to the policy cap.

use rand::{rng, Rng};
use std::error::Error;
use std::future::Future;
use std::time::Duration;

/// Terminal outcome of a single successful fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<R> {
    /// The target content was present and parsed.
    Rows(R),
    /// The page loaded but holds no data for this item.
    NoContent,
}

/// Async fetch of one work item.
///
/// Implementations must not share mutable session state across concurrent
/// calls; each call acquires whatever rendering or connection context it
/// needs and releases it before returning.
pub trait FetchTask {
    /// The unit of work (e.g. a lake record).
    type Item;
    /// The parsed content for one item.
    type Output;

    /// Fetch one item. `Err` means transient failure, eligible for retry.
    fn fetch(
        &self,
        item: &Self::Item,
    ) -> impl Future<Output = Result<Fetched<Self::Output>, Box<dyn Error + Send + Sync>>> + Send;
}

/// Exponential backoff schedule for transient fetch failures.
///
/// The delay before retry `i` (0-based) is
/// `min(base_delay * 2^i, max_delay)` plus uniform jitter in `[0, 1s)`.
/// The jitter keeps a burst of failing workers from hammering the upstream
/// server in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry (doubles with each retry).
    pub base_delay: Duration,
    /// Cap on the exponential delay, applied before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay before retry `i` (0-based).
    pub fn delay_for(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    /// Full backoff delay before retry `i`: [`delay_for`](Self::delay_for)
    /// plus uniform jitter in `[0, 1s)`.
    pub fn backoff_delay(&self, retry: usize) -> Duration {
        let jitter_ms: u64 = rng().random_range(0..1000);
        self.delay_for(retry) + Duration::from_millis(jitter_ms)
    }
}
