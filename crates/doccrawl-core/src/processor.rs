use tokio_util::sync::CancellationToken;

use crate::config::PromptConfig;
use crate::error::AppError;
use crate::extractor::ContentExtractor;
use crate::models::{CrawlTarget, FailureKind, FetchedPage, ProcessingOutcome};
use crate::rate_limit::{CallKind, CallSlot};
use crate::traits::{ArtifactStore, PageFetcher, TextTransform};
use crate::util::{sanitize_filename, strip_code_fences, truncate_chars};

/// Characters of page content sent to the language model.
pub const MAX_TRANSFORM_CHARS: usize = 4000;

/// Characters of page content shown in the debug preview.
pub const PREVIEW_CHARS: usize = 500;

/// Runs one page through fetch → extract → transform → persist.
///
/// Generic over all external dependencies via traits, so it can be tested
/// without real HTTP, model or filesystem calls. Every error is converted
/// into a failed [`ProcessingOutcome`]; nothing escapes as `Err`.
pub struct PageProcessor<P, T, S>
where
    P: PageFetcher,
    T: TextTransform,
    S: ArtifactStore,
{
    pages: P,
    transformer: T,
    store: S,
    extractor: ContentExtractor,
    prompt: PromptConfig,
    preview_content: bool,
}

impl<P, T, S> PageProcessor<P, T, S>
where
    P: PageFetcher,
    T: TextTransform,
    S: ArtifactStore,
{
    pub fn new(pages: P, transformer: T, store: S, prompt: PromptConfig) -> Self {
        Self {
            pages,
            transformer,
            store,
            extractor: ContentExtractor::new(),
            prompt,
            preview_content: true,
        }
    }

    /// Replace the default fallback chain.
    pub fn with_extractor(mut self, extractor: ContentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Log a preview of what is sent to the model (at DEBUG).
    pub fn with_content_preview(mut self, enabled: bool) -> Self {
        self.preview_content = enabled;
        self
    }

    /// Process one target inside an already acquired slot.
    ///
    /// Returns `None` when `cancel` fires before persistence starts. Once
    /// the write has begun it always runs to completion.
    pub async fn process(
        &self,
        target: &CrawlTarget,
        slot: &CallSlot,
        cancel: &CancellationToken,
    ) -> Option<ProcessingOutcome> {
        let url = target.url.as_str();
        if cancel.is_cancelled() {
            return None;
        }

        // 1. Fetch
        let fetched = tokio::select! {
            () = cancel.cancelled() => return None,
            page = slot.run(CallKind::Fetch, || async {
                Ok::<_, AppError>(self.pages.fetch_page(url).await)
            }) => page,
        };
        let mut page = fetched.unwrap_or_else(|e| FetchedPage::failed(url, e.to_string()));
        if !page.success {
            let detail = page.error_message.as_deref().unwrap_or("unknown error");
            return Some(ProcessingOutcome::failure(
                url,
                FailureKind::Fetch,
                format!("fetch failed: {detail}"),
            ));
        }

        // Structured extraction is a model call, so it gets the model delay.
        if self.pages.has_structured() {
            let extracted = tokio::select! {
                () = cancel.cancelled() => return None,
                value = slot.run(CallKind::Transform, || self.pages.extract_structured(&page)) => value,
            };
            match extracted {
                Ok(json) => page.extracted_content = Some(json),
                Err(e) => tracing::warn!(%url, error = %e, "Structured extraction failed"),
            }
        }

        // 2. Extract
        let Some(candidate) = self.extractor.extract(&page) else {
            tracing::warn!(%url, "No extractable content");
            return Some(ProcessingOutcome::failure(
                url,
                FailureKind::Extraction,
                "no extractable content",
            ));
        };
        tracing::info!(%url, source = %candidate.source_kind, chars = candidate.text.chars().count(), "Selected content");

        // 3. Transform
        let content = if candidate.source_kind.needs_transform() {
            let instruction = self.prompt.instruction(candidate.source_kind);
            let input = truncate_chars(&candidate.text, MAX_TRANSFORM_CHARS);
            if self.preview_content {
                tracing::debug!(%url, preview = %truncate_chars(input, PREVIEW_CHARS), "Content sent to model");
            }

            let reply = tokio::select! {
                () = cancel.cancelled() => return None,
                reply = slot.run(CallKind::Transform, || self.transformer.transform(&instruction, input)) => reply,
            };
            let text = match reply {
                Ok(text) => strip_code_fences(&text).trim().to_string(),
                Err(e) => {
                    return Some(ProcessingOutcome::failure(
                        url,
                        FailureKind::Transform,
                        format!("transform failed: {e}"),
                    ));
                }
            };
            if text.is_empty() {
                tracing::warn!(%url, "Model returned an empty reply");
                return Some(ProcessingOutcome::failure(
                    url,
                    FailureKind::Transform,
                    "transform failed: empty reply",
                ));
            }
            text
        } else {
            candidate.text
        };

        if cancel.is_cancelled() {
            return None;
        }

        // 4. Persist
        let file_name = sanitize_filename(url);
        match self.store.save(&file_name, &content).await {
            Ok(path) => {
                tracing::info!(%url, path = %path.display(), "Saved page");
                Some(ProcessingOutcome::success(url, path))
            }
            Err(e) => {
                tracing::error!(%url, file = %file_name, error = %e, "Failed to save page");
                Some(ProcessingOutcome::failure(
                    url,
                    FailureKind::Persistence,
                    format!("persist failed: {e}"),
                ))
            }
        }
    }
}
