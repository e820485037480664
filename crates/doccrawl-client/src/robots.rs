use std::collections::HashMap;
use std::sync::Arc;

use doccrawl_core::error::AppError;
use doccrawl_core::traits::Fetcher;
use robotstxt::DefaultMatcher;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

/// User-agent token matched against robots.txt groups.
pub const ROBOTS_USER_AGENT: &str = "doccrawl";

/// Fetcher wrapper that honours each origin's robots.txt.
///
/// robots.txt is fetched once per origin through the inner fetcher and
/// cached for the lifetime of the wrapper. If it cannot be fetched the
/// origin is treated as allowing everything.
#[derive(Clone)]
pub struct RobotsFetcher<F: Fetcher> {
    inner: F,
    user_agent: String,
    // origin -> robots.txt body (None = unavailable, allow all)
    cache: Arc<Mutex<HashMap<String, Arc<OnceCell<Option<String>>>>>>,
}

impl<F: Fetcher> RobotsFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self::with_user_agent(inner, ROBOTS_USER_AGENT)
    }

    pub fn with_user_agent(inner: F, user_agent: &str) -> Self {
        Self {
            inner,
            user_agent: user_agent.to_string(),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `url` may be fetched according to its origin's robots.txt.
    ///
    /// The map lock is only held to look up the origin's cell; the fetch
    /// itself runs on that cell, so other origins are never blocked by it.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(origin.clone()).or_default())
        };

        let body = cell
            .get_or_init(|| async {
                let robots_url = format!("{origin}/robots.txt");
                match self.inner.fetch(&robots_url).await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        tracing::debug!(%robots_url, error = %e, "robots.txt unavailable, allowing all");
                        None
                    }
                }
            })
            .await;

        match body {
            Some(body) if !body.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.user_agent, url.as_str())
            }
            _ => true,
        }
    }
}

impl<F: Fetcher> Fetcher for RobotsFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
        if parsed.path() != "/robots.txt" && !self.is_allowed(&parsed).await {
            tracing::warn!(%url, "Disallowed by robots.txt");
            return Err(AppError::RobotsDisallowed(url.to_string()));
        }
        self.inner.fetch(url).await
    }
}
