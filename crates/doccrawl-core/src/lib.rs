pub mod config;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod models;
pub mod page;
pub mod pipeline;
pub mod processor;
pub mod rate_limit;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ApiCredentials, AppConfig, PromptConfig};
pub use discovery::UrlDiscoverer;
pub use error::AppError;
pub use extractor::ContentExtractor;
pub use models::{
    BatchResult, ContentCandidate, CrawlTarget, ExtractionSchema, FailureKind, FetchedPage,
    ProcessingOutcome, SourceKind,
};
pub use page::HttpPageFetcher;
pub use pipeline::{BatchPipeline, count_crawlable_urls};
pub use processor::PageProcessor;
pub use rate_limit::{DelayRange, RateLimitConfig, RateLimitedCaller, RateLimitedFetcher};
pub use traits::{ArtifactStore, Cleaner, Extractor, Fetcher, PageFetcher, TextTransform};
