//! Content selection fallback chain.
//!
//! A [`ContentExtractor`] holds an ordered list of [`ExtractionStrategy`]
//! objects and returns the candidate of the first one that produces
//! non-blank text.

use crate::models::{ContentCandidate, FetchedPage, SourceKind};

/// One stage of the fallback chain.
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Return a candidate, or `None` if this stage has nothing usable.
    fn attempt(&self, page: &FetchedPage) -> Option<ContentCandidate>;
}

/// Uses content from a schema-driven extraction verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredContent;

/// Uses the boilerplate-pruned markdown rendering.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilteredMarkdown;

/// Uses the raw fetched HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawHtml;

impl ExtractionStrategy for StructuredContent {
    fn kind(&self) -> SourceKind {
        SourceKind::StructuredExtraction
    }

    fn attempt(&self, page: &FetchedPage) -> Option<ContentCandidate> {
        candidate(self.kind(), page.extracted_content.as_deref())
    }
}

impl ExtractionStrategy for FilteredMarkdown {
    fn kind(&self) -> SourceKind {
        SourceKind::FilteredMarkdown
    }

    fn attempt(&self, page: &FetchedPage) -> Option<ContentCandidate> {
        candidate(self.kind(), page.filtered_markdown.as_deref())
    }
}

impl ExtractionStrategy for RawHtml {
    fn kind(&self) -> SourceKind {
        SourceKind::RawHtml
    }

    fn attempt(&self, page: &FetchedPage) -> Option<ContentCandidate> {
        candidate(self.kind(), page.raw_html.as_deref())
    }
}

fn candidate(kind: SourceKind, text: Option<&str>) -> Option<ContentCandidate> {
    text.filter(|t| !t.trim().is_empty())
        .map(|t| ContentCandidate {
            source_kind: kind,
            text: t.to_string(),
        })
}

/// Picks the best available content for a page.
pub struct ContentExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ContentExtractor {
    /// Structured extraction, then filtered markdown, then raw HTML.
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(StructuredContent),
            Box::new(FilteredMarkdown),
            Box::new(RawHtml),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, page: &FetchedPage) -> Option<ContentCandidate> {
        self.strategies.iter().find_map(|strategy| {
            let found = strategy.attempt(page);
            if found.is_none() {
                tracing::debug!(url = %page.url, stage = %strategy.kind(), "Extraction stage empty");
            }
            found
        })
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}
