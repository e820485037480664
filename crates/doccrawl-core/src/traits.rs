use std::future::Future;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::FetchedPage;

/// Fetches raw HTML (or any text body) from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Converts raw HTML into boilerplate-pruned Markdown.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Extracts structured JSON data from text content using an LLM.
pub trait Extractor: Send + Sync + Clone {
    /// Sends the content and JSON schema to the LLM and returns extracted JSON.
    fn extract(
        &self,
        content: &str,
        schema: &serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Rewrites text according to an instruction using a language model.
pub trait TextTransform: Send + Sync + Clone {
    fn transform(
        &self,
        instruction: &str,
        content: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Produces the representations of a page.
///
/// `fetch_page` never fails: fetch problems are reported through
/// [`FetchedPage::success`]. Structured extraction is a separate step
/// because it is a model call and is rate limited as one.
pub trait PageFetcher: Send + Sync {
    fn fetch_page(&self, url: &str) -> impl Future<Output = FetchedPage> + Send;

    /// Whether a schema is configured for structured extraction.
    fn has_structured(&self) -> bool;

    /// Run schema-driven extraction over a fetched page; returns pretty JSON.
    fn extract_structured(
        &self,
        page: &FetchedPage,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persists one artifact per page.
pub trait ArtifactStore: Send + Sync + Clone {
    /// Write `content` under `file_name` and return the full output path.
    ///
    /// Implementations must never leave a partially written file behind.
    fn save(
        &self,
        file_name: &str,
        content: &str,
    ) -> impl Future<Output = Result<PathBuf, AppError>> + Send;
}

/// An Extractor that is never called; used when structured extraction is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExtractor;

impl Extractor for NullExtractor {
    async fn extract(
        &self,
        _content: &str,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        Err(AppError::Generic(
            "structured extraction is not configured".into(),
        ))
    }
}
