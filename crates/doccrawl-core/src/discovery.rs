//! Page discovery for a documentation site.
//!
//! Looks for `/sitemap.xml` at the seed's origin first. When that fails
//! (network error, non-2xx status, unparseable or empty document) it falls
//! back to the links found on the seed page itself. Failures never escape:
//! the only visible failure mode is an empty list.

use std::collections::HashSet;
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::{Html, Selector};
use url::Url;

use crate::error::AppError;
use crate::traits::Fetcher;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Finds the in-scope page URLs reachable from a seed URL.
#[derive(Clone)]
pub struct UrlDiscoverer<F: Fetcher> {
    fetcher: F,
}

impl<F: Fetcher> UrlDiscoverer<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Discover up to `cap` page URLs for `seed`.
    ///
    /// Sitemap order is preserved; fallback links keep their order of
    /// appearance on the seed page.
    pub async fn discover(&self, seed: &str, cap: usize) -> Vec<String> {
        let seed_url = match Url::parse(seed) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(%seed, error = %e, "Seed URL is not a valid URL");
                return Vec::new();
            }
        };

        match self.sitemap_urls(&seed_url).await {
            Ok(urls) if !urls.is_empty() => {
                tracing::info!(count = urls.len(), "Using URLs from sitemap");
                return truncate(urls, cap);
            }
            Ok(_) => tracing::warn!("Sitemap contained no <loc> entries, falling back to page links"),
            Err(e) => tracing::warn!(error = %e, "Sitemap unavailable, falling back to page links"),
        }

        match self.page_links(&seed_url).await {
            Ok(links) => {
                tracing::info!(count = links.len(), "Found internal links on seed page");
                truncate(links, cap)
            }
            Err(e) => {
                tracing::error!(%seed, error = %e, "Could not read links from seed page");
                Vec::new()
            }
        }
    }

    /// Number of crawlable URLs for `seed`, without any cap. Writes nothing.
    pub async fn count(&self, seed: &str) -> usize {
        let urls = self.discover(seed, usize::MAX).await;
        for url in &urls {
            tracing::info!(%url, "Crawlable URL");
        }
        tracing::info!(%seed, count = urls.len(), "Counted crawlable URLs");
        urls.len()
    }

    /// Fetch and parse `<origin>/sitemap.xml`.
    pub async fn sitemap_urls(&self, seed: &Url) -> Result<Vec<String>, AppError> {
        let sitemap = sitemap_url(seed);
        tracing::info!(%sitemap, "Fetching sitemap");
        let xml = self.fetcher.fetch(&sitemap).await?;
        parse_sitemap(&xml)
    }

    /// Fetch the seed page and collect its same-origin links.
    pub async fn page_links(&self, seed: &Url) -> Result<Vec<String>, AppError> {
        tracing::info!(seed = %seed, "Fetching seed page for links");
        let html = self.fetcher.fetch(seed.as_str()).await?;
        if html.trim().is_empty() {
            return Err(AppError::HttpError(format!("Empty body for {seed}")));
        }
        Ok(extract_links(&html, seed))
    }
}

fn truncate(mut urls: Vec<String>, cap: usize) -> Vec<String> {
    urls.truncate(cap);
    urls
}

/// `{scheme}://{host[:port]}/sitemap.xml` for the seed's origin.
pub fn sitemap_url(seed: &Url) -> String {
    format!("{}/sitemap.xml", seed.origin().ascii_serialization())
}

/// Collect the text of every `<loc>` nested in a `<url>` element.
///
/// Namespaces are ignored, so `<urlset xmlns="http://www.sitemaps.org/...">`,
/// prefixed `<sm:url>` and bare `<url>` documents all parse the same way.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" => in_url = true,
                b"loc" if in_url => {
                    in_loc = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => in_url = false,
                b"loc" if in_loc => {
                    let loc = current.trim();
                    if !loc.is_empty() {
                        urls.push(loc.to_string());
                    }
                    in_loc = false;
                }
                _ => {}
            },
            Ok(Event::Text(text)) if in_loc => {
                let text = text
                    .unescape()
                    .map_err(|e| AppError::Generic(format!("Invalid sitemap text: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::CData(data)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::Generic(format!(
                    "Invalid sitemap XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(urls)
}

/// Same-origin links of an HTML page, fragment-free, deduplicated in
/// order of first appearance.
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !is_followable_href(href) {
            continue;
        }
        let Ok(mut resolved) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") || !same_origin(base, &resolved) {
            continue;
        }
        resolved.set_fragment(None);
        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

fn is_followable_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    let lower = href.to_ascii_lowercase();
    !(lower.starts_with("javascript:") || lower.starts_with("mailto:"))
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
