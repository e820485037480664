use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::discovery::UrlDiscoverer;
use crate::models::{BatchResult, CrawlTarget, FailureKind, ProcessingOutcome};
use crate::processor::PageProcessor;
use crate::rate_limit::RateLimitedCaller;
use crate::traits::{ArtifactStore, Fetcher, PageFetcher, TextTransform};

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    Started {
        pages: usize,
        concurrency: usize,
    },
    PageSucceeded {
        outcome: &'a ProcessingOutcome,
    },
    PageFailed {
        outcome: &'a ProcessingOutcome,
    },
    PageDropped {
        error: &'a str,
    },
    Finished {
        result: &'a BatchResult,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::Started { pages, concurrency } => {
                tracing::info!(%pages, %concurrency, "Processing pages");
            }
            PipelineEvent::PageSucceeded { outcome } => {
                let path = outcome
                    .output_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                tracing::info!(url = %outcome.url, %path, "Page processed");
            }
            PipelineEvent::PageFailed { outcome } => {
                tracing::warn!(
                    url = %outcome.url,
                    kind = %outcome.failure_kind.unwrap_or(FailureKind::Other),
                    reason = outcome.reason.as_deref().unwrap_or_default(),
                    "Page failed"
                );
            }
            PipelineEvent::PageDropped { error } => {
                tracing::error!(%error, "Page task died without an outcome");
            }
            PipelineEvent::Finished { result } => {
                tracing::info!(
                    successes = result.success_count(),
                    failures = result.failure_count(),
                    dropped = result.dropped,
                    cancelled = result.cancelled,
                    duration_ms = %result.duration.as_millis(),
                    "Batch finished"
                );
            }
        }
    }
}

/// Runs a batch of pages through a shared [`PageProcessor`] with bounded
/// concurrency.
///
/// Every page task holds one slot of the shared [`RateLimitedCaller`] for
/// its whole fetch → transform → persist run, so at most `limit()` pages
/// are in flight at once.
pub struct BatchPipeline<P, T, S>
where
    P: PageFetcher,
    T: TextTransform,
    S: ArtifactStore,
{
    processor: Arc<PageProcessor<P, T, S>>,
    caller: RateLimitedCaller,
}

impl<P, T, S> BatchPipeline<P, T, S>
where
    P: PageFetcher + 'static,
    T: TextTransform + 'static,
    S: ArtifactStore + 'static,
{
    pub fn new(processor: PageProcessor<P, T, S>, caller: RateLimitedCaller) -> Self {
        Self {
            processor: Arc::new(processor),
            caller,
        }
    }

    /// Process at most `cap` targets, reporting through `tracing`.
    pub async fn run(
        &self,
        targets: Vec<CrawlTarget>,
        cap: usize,
        cancel: CancellationToken,
    ) -> BatchResult {
        self.run_with_reporter(targets, cap, cancel, &TracingPipelineReporter)
            .await
    }

    /// Process at most `cap` targets.
    ///
    /// Outcomes are collected in completion order. A task that panics is
    /// counted in `dropped`; a target that never finished because `cancel`
    /// fired is counted in `cancelled`.
    pub async fn run_with_reporter<R: PipelineReporter>(
        &self,
        mut targets: Vec<CrawlTarget>,
        cap: usize,
        cancel: CancellationToken,
        reporter: &R,
    ) -> BatchResult {
        let start = Instant::now();
        targets.truncate(cap);
        reporter.report(PipelineEvent::Started {
            pages: targets.len(),
            concurrency: self.caller.limit(),
        });

        let mut tasks = JoinSet::new();
        for target in targets {
            let processor = Arc::clone(&self.processor);
            let caller = self.caller.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let slot = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return None,
                    slot = caller.acquire() => match slot {
                        Ok(slot) => slot,
                        Err(e) => {
                            return Some(ProcessingOutcome::failure(
                                &target.url,
                                FailureKind::Other,
                                e.to_string(),
                            ));
                        }
                    },
                };
                processor.process(&target, &slot, &cancel).await
            });
        }

        let mut result = BatchResult::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => {
                    if outcome.is_success() {
                        reporter.report(PipelineEvent::PageSucceeded { outcome: &outcome });
                    } else {
                        reporter.report(PipelineEvent::PageFailed { outcome: &outcome });
                    }
                    result.outcomes.push(outcome);
                }
                Ok(None) => result.cancelled += 1,
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(PipelineEvent::PageDropped { error: &error });
                    result.dropped += 1;
                }
            }
        }

        result.duration = start.elapsed();
        reporter.report(PipelineEvent::Finished { result: &result });
        result
    }
}

/// Count the pages that a run for `seed` would consider, without a cap.
///
/// Only discovery requests are made; nothing is written.
pub async fn count_crawlable_urls<F: Fetcher>(fetcher: F, seed: &str) -> usize {
    let start = Instant::now();
    let count = UrlDiscoverer::new(fetcher).count(seed).await;
    let duration: Duration = start.elapsed();
    tracing::info!(%count, duration_ms = %duration.as_millis(), "Count finished");
    count
}
