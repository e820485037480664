use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::AppError;

/// User-supplied extraction schema (JSON Schema subset).
///
/// When present, pages are first run through schema-driven extraction and
/// the resulting JSON is stored verbatim.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractionSchema {
    /// Human-readable schema name (e.g., "api_endpoint")
    pub name: String,
    /// JSON Schema definition for the LLM
    pub schema: serde_json::Value,
}

/// A page scheduled for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    /// Host (and explicit port, if any) of `url`.
    pub domain: String,
}

impl CrawlTarget {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::HttpError(format!("URL has no host: {url}")))?;
        let domain = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self {
            url: url.to_string(),
            domain,
        })
    }

    /// Build targets from discovered URLs, skipping any that do not parse.
    pub fn from_urls<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        urls.into_iter()
            .filter_map(|u| match Self::new(u.as_ref()) {
                Ok(target) => Some(target),
                Err(e) => {
                    tracing::warn!(url = %u.as_ref(), error = %e, "Skipping unparseable URL");
                    None
                }
            })
            .collect()
    }
}

/// Everything the page-fetch capability produced for one URL.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub url: String,
    pub raw_html: Option<String>,
    /// Output of a structured (schema-driven) extraction, if one ran.
    pub extracted_content: Option<String>,
    /// Boilerplate-pruned markdown rendering of the page.
    pub filtered_markdown: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl FetchedPage {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            error_message: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Where a piece of content came from, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    StructuredExtraction,
    FilteredMarkdown,
    RawHtml,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::StructuredExtraction => "structured_extraction",
            SourceKind::FilteredMarkdown => "filtered_markdown",
            SourceKind::RawHtml => "raw_html",
        }
    }

    /// Whether content of this kind still has to go through the language model.
    pub fn needs_transform(&self) -> bool {
        !matches!(self, SourceKind::StructuredExtraction)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The content selected for a page by the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentCandidate {
    pub source_kind: SourceKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Failure class of a page that did not produce an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Fetch,
    Extraction,
    Transform,
    Persistence,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Fetch => "fetch",
            FailureKind::Extraction => "extraction",
            FailureKind::Transform => "transform",
            FailureKind::Persistence => "persistence",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal record for one URL's processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub url: String,
    pub output_path: Option<PathBuf>,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
    pub failure_kind: Option<FailureKind>,
}

impl ProcessingOutcome {
    pub fn success(url: &str, output_path: PathBuf) -> Self {
        Self {
            url: url.to_string(),
            output_path: Some(output_path),
            status: OutcomeStatus::Success,
            reason: None,
            failure_kind: None,
        }
    }

    pub fn failure(url: &str, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            output_path: None,
            status: OutcomeStatus::Failure,
            reason: Some(reason.into()),
            failure_kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// One outcome per settled target, in completion order.
    pub outcomes: Vec<ProcessingOutcome>,
    /// Targets whose task died without producing an outcome.
    pub dropped: usize,
    /// Targets that were not finished because the run was cancelled.
    pub cancelled: usize,
    pub duration: Duration,
}

impl BatchResult {
    pub fn successes(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn failure_count_of(&self, kind: FailureKind) -> usize {
        self.failures()
            .filter(|o| o.failure_kind == Some(kind))
            .count()
    }
}
