use crate::error::AppError;
use crate::models::{ExtractionSchema, FetchedPage};
use crate::traits::{Cleaner, Extractor, Fetcher, PageFetcher};

/// Schema-driven extraction run over a fetched page.
#[derive(Clone)]
pub struct StructuredExtraction<E: Extractor> {
    pub extractor: E,
    pub schema: ExtractionSchema,
}

/// Builds a [`FetchedPage`] from a raw fetcher, a content filter and an
/// optional structured extractor.
///
/// Only a failed fetch marks the page as failed. A filter error just leaves
/// the markdown representation empty, so the fallback chain can move on to
/// the next stage.
#[derive(Clone)]
pub struct HttpPageFetcher<F, C, E>
where
    F: Fetcher,
    C: Cleaner,
    E: Extractor,
{
    fetcher: F,
    cleaner: C,
    structured: Option<StructuredExtraction<E>>,
}

impl<F, C, E> HttpPageFetcher<F, C, E>
where
    F: Fetcher,
    C: Cleaner,
    E: Extractor,
{
    /// Fetch + filter only.
    pub fn new(fetcher: F, cleaner: C) -> Self {
        Self {
            fetcher,
            cleaner,
            structured: None,
        }
    }

    /// Also run schema-driven extraction on every fetched page.
    pub fn with_structured(mut self, extractor: E, schema: ExtractionSchema) -> Self {
        self.structured = Some(StructuredExtraction { extractor, schema });
        self
    }
}

impl<F, C, E> PageFetcher for HttpPageFetcher<F, C, E>
where
    F: Fetcher,
    C: Cleaner,
    E: Extractor,
{
    async fn fetch_page(&self, url: &str) -> FetchedPage {
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Fetch failed");
                return FetchedPage::failed(url, e.to_string());
            }
        };
        tracing::debug!(%url, bytes = html.len(), "Fetched page");

        let filtered = match self.cleaner.clean(&html) {
            Ok(markdown) => {
                let reduction_pct = if html.is_empty() {
                    0
                } else {
                    100usize.saturating_sub(markdown.len() * 100 / html.len())
                };
                tracing::debug!(%url, bytes = markdown.len(), reduction_pct, "Filtered to markdown");
                Some(markdown)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "Content filter failed");
                None
            }
        };

        FetchedPage {
            url: url.to_string(),
            raw_html: Some(html),
            extracted_content: None,
            filtered_markdown: filtered,
            success: true,
            error_message: None,
        }
    }

    fn has_structured(&self) -> bool {
        self.structured.is_some()
    }

    async fn extract_structured(&self, page: &FetchedPage) -> Result<String, AppError> {
        let Some(structured) = &self.structured else {
            return Err(AppError::Generic(
                "structured extraction is not configured".into(),
            ));
        };
        let input = page
            .filtered_markdown
            .as_deref()
            .filter(|md| !md.trim().is_empty())
            .or(page.raw_html.as_deref())
            .unwrap_or_default();

        let value = structured
            .extractor
            .extract(input, &structured.schema.schema)
            .await?;
        tracing::debug!(url = %page.url, schema = %structured.schema.name, "Extracted structured content");
        serde_json::to_string_pretty(&value)
            .map_err(|e| AppError::SchemaValidationError(e.to_string()))
    }
}
