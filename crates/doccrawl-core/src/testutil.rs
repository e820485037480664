//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::traits::{ArtifactStore, Cleaner, Extractor, Fetcher, TextTransform};

// ---------------------------------------------------------------------------
// InFlight
// ---------------------------------------------------------------------------

/// Tracks how many calls are running at once and the highest value seen.
#[derive(Clone, Default)]
pub struct InFlight {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Canned reply for a routed URL.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Body(String),
    Status(u16),
    Timeout,
}

impl MockResponse {
    fn into_result(self) -> Result<String, AppError> {
        match self {
            MockResponse::Body(body) => Ok(body),
            MockResponse::Status(status) => Err(AppError::HttpError(format!("HTTP {status}"))),
            MockResponse::Timeout => Err(AppError::Timeout(30)),
        }
    }
}

/// Mock fetcher that returns configurable responses.
///
/// Routed URLs always get their route. Other URLs pop the response queue,
/// and once it is empty get the fallback.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    routes: Arc<HashMap<String, MockResponse>>,
    fallback: MockResponse,
    requested: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    in_flight: InFlight,
}

impl MockFetcher {
    fn build(responses: Vec<Result<String, AppError>>, routes: HashMap<String, MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            routes: Arc::new(routes),
            fallback: MockResponse::Body("<html><body>default</body></html>".to_string()),
            requested: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            in_flight: InFlight::default(),
        }
    }

    pub fn new(html: &str) -> Self {
        Self::build(vec![Ok(html.to_string())], HashMap::new())
    }

    pub fn with_error(error: AppError) -> Self {
        Self::build(vec![Err(error)], HashMap::new())
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self::build(responses, HashMap::new())
    }

    /// Fixed replies per URL; anything unrouted is a 404.
    pub fn with_routes(routes: Vec<(&str, MockResponse)>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(url, response)| (url.to_string(), response))
            .collect();
        let mut fetcher = Self::build(Vec::new(), routes);
        fetcher.fallback = MockResponse::Status(404);
        fetcher
    }

    pub fn with_fallback(mut self, fallback: MockResponse) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every URL fetched so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    fn respond(&self, url: &str) -> Result<String, AppError> {
        if let Some(route) = self.routes.get(url) {
            return route.clone().into_result();
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            self.fallback.clone().into_result()
        } else {
            responses.remove(0)
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.respond(url);
        self.in_flight.exit();
        result
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that returns its input unchanged or a one-off error.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner that returns an error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns configurable JSON.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<serde_json::Value, AppError>>>>,
}

impl MockExtractor {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(data)])),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }
}

impl Extractor for MockExtractor {
    async fn extract(
        &self,
        _content: &str,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(serde_json::json!({"default": true}))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockTransformer
// ---------------------------------------------------------------------------

/// Recorded transform call: (instruction, content).
pub type TransformCall = (String, String);

/// Mock language model. Without queued replies it prefixes the content
/// with a heading.
#[derive(Clone)]
pub struct MockTransformer {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub calls: Arc<Mutex<Vec<TransformCall>>>,
    panic_marker: Option<String>,
    delay: Duration,
    in_flight: InFlight,
}

impl MockTransformer {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
            panic_marker: None,
            delay: Duration::ZERO,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    /// Panic whenever the content contains `marker`.
    pub fn panicking_on(mut self, marker: &str) -> Self {
        self.panic_marker = Some(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TextTransform for MockTransformer {
    async fn transform(&self, instruction: &str, content: &str) -> Result<String, AppError> {
        if let Some(marker) = &self.panic_marker {
            if content.contains(marker.as_str()) {
                panic!("mock transformer hit {marker}");
            }
        }
        self.calls
            .lock()
            .unwrap()
            .push((instruction.to_string(), content.to_string()));
        self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.exit();

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(format!("# Rewritten\n\n{content}"))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Recorded save: (file_name, content).
pub type SavedArtifact = (String, String);

/// Mock artifact store that records saves in memory.
#[derive(Clone)]
pub struct MockStore {
    pub saved: Arc<Mutex<Vec<SavedArtifact>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Store whose first save fails.
    pub fn with_save_error(error: AppError) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ArtifactStore for MockStore {
    async fn save(&self, file_name: &str, content: &str) -> Result<PathBuf, AppError> {
        let mut err = self.save_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), content.to_string()));
        Ok(PathBuf::from("out").join(file_name))
    }
}
