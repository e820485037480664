use std::sync::{Arc, LazyLock};

use doccrawl_core::error::AppError;
use doccrawl_core::traits::Cleaner;
use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};

/// Tags whose whole subtree is page chrome rather than documentation.
pub const BOILERPLATE_TAGS: &[&str] = &[
    "header", "footer", "nav", "aside", "script", "style", "form", "iframe", "button", "input",
    "select", "textarea", "noscript", "svg",
];

/// Filtered output with fewer words than this is discarded.
pub const DEFAULT_MIN_WORDS: usize = 10;

static MAIN_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("main, article, [role=\"main\"]").expect("static selector is valid"));

/// Boilerplate-pruning HTML-to-Markdown filter using htmd.
///
/// Converts only the `<main>`/`<article>` region when the page has one,
/// skips navigation, forms and other chrome, and returns an empty string
/// when what remains is too short to be worth keeping.
#[derive(Clone)]
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
    min_words: usize,
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(BOILERPLATE_TAGS.to_vec())
            .build();

        Self {
            converter: Arc::new(converter),
            min_words: DEFAULT_MIN_WORDS,
        }
    }

    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// The HTML of the main content region, if the page marks one.
fn main_region(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&MAIN_CONTENT)
        .find(|el| el.text().any(|t| !t.trim().is_empty()))
        .map(|el| el.html())
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let region = main_region(html);
        let markdown = self
            .converter
            .convert(region.as_deref().unwrap_or(html))
            .map_err(|e| AppError::CleanerError(e.to_string()))?;

        let words = markdown.split_whitespace().count();
        if words < self.min_words {
            tracing::debug!(words, min_words = self.min_words, "Filtered content too short, discarding");
            return Ok(String::new());
        }
        Ok(markdown.trim().to_string())
    }
}
