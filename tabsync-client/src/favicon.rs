//! Favicon retrieval for local tabs.
//!
//! Fetches run as tokio tasks. Each completion is sent back on an unbounded
//! channel tagged with the tab and the request id, and the associator applies
//! it on its own task. Request ids are never reused, so a completion for a
//! cancelled or superseded request can always be recognized and dropped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tabsync_types::TabId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Favicon fetch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaviconError {
    /// The page has no favicon yet.
    #[error("no favicon available for {0}")]
    NotAvailable(String),

    /// The fetch itself failed.
    #[error("favicon fetch failed: {0}")]
    FetchFailed(String),
}

/// A fetched favicon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconImage {
    /// URL the icon was loaded from.
    pub icon_url: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

/// Source of favicon bytes for page URLs.
#[async_trait]
pub trait FaviconFetcher: Send + Sync {
    /// Fetch the favicon for `page_url`.
    async fn fetch(&self, page_url: &str) -> Result<FaviconImage, FaviconError>;
}

/// A finished fetch, delivered back to the associator.
#[derive(Debug)]
pub struct FaviconLoad {
    /// Tab the request was made for.
    pub tab_id: TabId,
    /// Id of the request.
    pub request_id: u64,
    /// Page URL that was fetched.
    pub page_url: String,
    /// Outcome of the fetch.
    pub result: Result<FaviconImage, FaviconError>,
}

/// Spawns favicon fetches and collects their completions.
pub struct FaviconLoader {
    fetcher: Arc<dyn FaviconFetcher>,
    next_request_id: u64,
    in_flight: HashMap<TabId, (u64, JoinHandle<()>)>,
    tx: mpsc::UnboundedSender<FaviconLoad>,
    rx: mpsc::UnboundedReceiver<FaviconLoad>,
}

impl FaviconLoader {
    /// Create a loader backed by `fetcher`.
    pub fn new(fetcher: Arc<dyn FaviconFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            next_request_id: 1,
            in_flight: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Start fetching the favicon of `page_url` for `tab_id`.
    ///
    /// Any fetch already running for the tab is aborted. Returns the new
    /// request id, or `None` when no tokio runtime is available.
    pub fn request(&mut self, tab_id: TabId, page_url: &str) -> Option<u64> {
        self.cancel(tab_id);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, skipping favicon load for {}", page_url);
            return None;
        };

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let page_url = page_url.to_string();
        let task = handle.spawn(async move {
            let result = fetcher.fetch(&page_url).await;
            // Receiver gone means the associator was dropped.
            let _ = tx.send(FaviconLoad {
                tab_id,
                request_id,
                page_url,
                result,
            });
        });
        self.in_flight.insert(tab_id, (request_id, task));
        Some(request_id)
    }

    /// Abort the fetch running for `tab_id`, if any.
    pub fn cancel(&mut self, tab_id: TabId) {
        if let Some((_, task)) = self.in_flight.remove(&tab_id) {
            task.abort();
        }
    }

    /// Abort every running fetch.
    pub fn cancel_all(&mut self) {
        for (_, (_, task)) in self.in_flight.drain() {
            task.abort();
        }
    }

    /// Next completion, if one is already waiting.
    pub fn try_next(&mut self) -> Option<FaviconLoad> {
        let load = self.rx.try_recv().ok()?;
        self.finish(&load);
        Some(load)
    }

    /// Wait for the next completion.
    ///
    /// Waits forever if nothing is in flight.
    pub async fn next(&mut self) -> Option<FaviconLoad> {
        let load = self.rx.recv().await?;
        self.finish(&load);
        Some(load)
    }

    fn finish(&mut self, load: &FaviconLoad) {
        if self
            .in_flight
            .get(&load.tab_id)
            .is_some_and(|(request_id, _)| *request_id == load.request_id)
        {
            self.in_flight.remove(&load.tab_id);
        }
    }
}

impl std::fmt::Debug for FaviconLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaviconLoader")
            .field("next_request_id", &self.next_request_id)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

/// Mock favicon fetcher for testing.
///
/// Serves icons registered per page URL and records every request.
#[derive(Debug, Default)]
pub struct MockFaviconFetcher {
    inner: Arc<Mutex<MockFaviconFetcherInner>>,
}

#[derive(Debug, Default)]
struct MockFaviconFetcherInner {
    icons: HashMap<String, FaviconImage>,
    requests: Vec<String>,
    fail_next_fetch: Option<String>,
}

impl MockFaviconFetcher {
    /// Create a fetcher with no icons.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockFaviconFetcherInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `data` from `icon_url` for `page_url`.
    pub fn set_icon(&self, page_url: &str, icon_url: &str, data: Vec<u8>) {
        self.lock().icons.insert(
            page_url.to_string(),
            FaviconImage {
                icon_url: icon_url.to_string(),
                data,
            },
        );
    }

    /// Every page URL requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Cause the next fetch to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        self.lock().fail_next_fetch = Some(error.to_string());
    }
}

impl Clone for MockFaviconFetcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl FaviconFetcher for MockFaviconFetcher {
    async fn fetch(&self, page_url: &str) -> Result<FaviconImage, FaviconError> {
        let mut inner = self.lock();
        inner.requests.push(page_url.to_string());
        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(FaviconError::FetchFailed(error));
        }
        inner
            .icons
            .get(page_url)
            .cloned()
            .ok_or_else(|| FaviconError::NotAvailable(page_url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_with(fetcher: &MockFaviconFetcher) -> FaviconLoader {
        FaviconLoader::new(Arc::new(fetcher.clone()))
    }

    #[tokio::test]
    async fn request_delivers_completion() {
        let fetcher = MockFaviconFetcher::new();
        fetcher.set_icon("https://a.example/", "https://a.example/i.ico", vec![1, 2]);
        let mut loader = loader_with(&fetcher);

        let id = loader.request(TabId::new(1), "https://a.example/").unwrap();
        let load = loader.next().await.unwrap();

        assert_eq!(load.request_id, id);
        assert_eq!(load.tab_id, TabId::new(1));
        assert_eq!(load.result.unwrap().data, vec![1, 2]);
    }

    #[tokio::test]
    async fn request_ids_are_never_reused() {
        let fetcher = MockFaviconFetcher::new();
        let mut loader = loader_with(&fetcher);

        let a = loader.request(TabId::new(1), "https://a.example/").unwrap();
        loader.cancel_all();
        let b = loader.request(TabId::new(1), "https://a.example/").unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn missing_icon_reports_not_available() {
        let fetcher = MockFaviconFetcher::new();
        let mut loader = loader_with(&fetcher);

        loader.request(TabId::new(2), "https://none.example/");
        let load = loader.next().await.unwrap();
        assert!(matches!(load.result, Err(FaviconError::NotAvailable(_))));
        assert_eq!(fetcher.requests(), vec!["https://none.example/".to_string()]);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let fetcher = MockFaviconFetcher::new();
        fetcher.set_icon("https://a.example/", "https://a.example/i.ico", vec![1]);
        fetcher.fail_next_fetch("offline");

        assert!(matches!(
            fetcher.fetch("https://a.example/").await,
            Err(FaviconError::FetchFailed(_))
        ));
        assert!(fetcher.fetch("https://a.example/").await.is_ok());
    }

    #[test]
    fn request_without_runtime_is_skipped() {
        let fetcher = MockFaviconFetcher::new();
        let mut loader = loader_with(&fetcher);
        assert!(loader.request(TabId::new(1), "https://a.example/").is_none());
        assert!(loader.try_next().is_none());
    }
}
