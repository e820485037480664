//! Shared concurrency budget and delay jitter for external calls.
//!
//! Every fetch and language-model call goes through a [`RateLimitedCaller`].
//! The caller owns one semaphore for the whole batch, so the number of
//! simultaneous external calls never exceeds the configured limit, and it
//! sleeps for a uniformly sampled delay around each call to avoid tripping
//! server-side throttling or anti-bot detection.
//!
//! A page pipeline that makes several calls in a row holds a single
//! [`CallSlot`] for all of them, so one page counts once against the budget.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use doccrawl_core::rate_limit::{CallKind, DelayRange, RateLimitConfig, RateLimitedCaller};
//!
//! # async fn run() -> Result<(), doccrawl_core::AppError> {
//! let config = RateLimitConfig::default()
//!     .with_concurrency(3)
//!     .with_fetch_delay(DelayRange::new(Duration::from_secs(1), Duration::from_secs(3)));
//! let caller = RateLimitedCaller::new(config);
//! let _body = caller
//!     .call(CallKind::Fetch, || async { Ok::<_, doccrawl_core::AppError>("<html></html>".to_string()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;
use crate::traits::Fetcher;

/// Default number of pages/calls allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// An inclusive window a delay is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Build a window; bounds given in the wrong order are swapped.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Build a window from seconds. Negative or non-finite values count as zero.
    pub fn from_secs_f64(min: f64, max: f64) -> Self {
        Self::new(secs_to_duration(min), secs_to_duration(max))
    }

    /// Draw a delay uniformly from `[min, max]` at millisecond resolution.
    pub fn sample(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if min_ms >= max_ms {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// What kind of external call is being made; decides which delay applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Page/sitemap fetch: delay is applied before the call.
    Fetch,
    /// Language-model call: delay is applied after the call, before the
    /// slot is released.
    Transform,
    /// Anything else: no delay.
    Other,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Fetch => "fetch",
            CallKind::Transform => "transform",
            CallKind::Other => "other",
        }
    }
}

/// Configuration for the rate-limited caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum simultaneous slots.
    pub concurrency: usize,
    /// Slept before every fetch.
    pub fetch_delay: DelayRange,
    /// Slept after every language-model call.
    pub transform_delay: DelayRange,
}

impl RateLimitConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_fetch_delay(mut self, delay: DelayRange) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_transform_delay(mut self, delay: DelayRange) -> Self {
        self.transform_delay = delay;
        self
    }

    /// No delays at all; the concurrency limit still applies.
    pub fn without_delays(mut self) -> Self {
        self.fetch_delay = DelayRange::ZERO;
        self.transform_delay = DelayRange::ZERO;
        self
    }
}

impl Default for RateLimitConfig {
    /// 3 slots, 1-3s before fetches, 2-4s after model calls.
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_delay: DelayRange::new(Duration::from_secs(1), Duration::from_secs(3)),
            transform_delay: DelayRange::new(Duration::from_secs(2), Duration::from_secs(4)),
        }
    }
}

/// Bounds in-flight external calls and spaces them out.
///
/// Cheap to clone: all clones share the same semaphore.
#[derive(Debug, Clone)]
pub struct RateLimitedCaller {
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
}

impl RateLimitedCaller {
    pub fn new(config: RateLimitConfig) -> Self {
        let config = config.with_concurrency(config.concurrency);
        Self {
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
        }
    }

    pub fn limit(&self) -> usize {
        self.config.concurrency
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot. The slot is released when dropped.
    pub async fn acquire(&self) -> Result<CallSlot, AppError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AppError::Generic("rate limiter closed".into()))?;
        Ok(CallSlot {
            _permit: permit,
            config: self.config,
        })
    }

    /// Acquire a slot, run one call in it, and release it.
    pub async fn call<T, F, Fut>(&self, kind: CallKind, op: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let slot = self.acquire().await?;
        slot.run(kind, op).await
    }
}

/// One unit of the shared concurrency budget.
#[derive(Debug)]
pub struct CallSlot {
    _permit: OwnedSemaphorePermit,
    config: RateLimitConfig,
}

impl CallSlot {
    /// Run `op` with the delay policy of `kind` applied around it.
    ///
    /// Errors are logged and handed back as values.
    pub async fn run<T, F, Fut>(&self, kind: CallKind, op: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if kind == CallKind::Fetch {
            pause(self.config.fetch_delay, kind).await;
        }

        let result = op().await;

        if kind == CallKind::Transform {
            pause(self.config.transform_delay, kind).await;
        }

        if let Err(e) = &result {
            tracing::warn!(kind = kind.as_str(), error = %e, "External call failed");
        }
        result
    }
}

async fn pause(range: DelayRange, kind: CallKind) {
    let delay = range.sample();
    if delay.is_zero() {
        return;
    }
    tracing::debug!(
        kind = kind.as_str(),
        sleep_ms = %delay.as_millis(),
        "Rate limiting call"
    );
    tokio::time::sleep(delay).await;
}

/// A [`Fetcher`] whose every request takes a slot and the fetch delay.
///
/// Used for calls made outside a page pipeline, such as sitemap and seed
/// page discovery.
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher<F> {
    inner: F,
    caller: RateLimitedCaller,
}

impl<F: Fetcher> RateLimitedFetcher<F> {
    pub fn new(inner: F, caller: RateLimitedCaller) -> Self {
        Self { inner, caller }
    }
}

impl<F: Fetcher> Fetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.caller
            .call(CallKind::Fetch, || self.inner.fetch(url))
            .await
    }
}
