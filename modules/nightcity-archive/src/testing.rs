// Test double for the wiki boundary.
//
// MockFetcher (WikiFetcher): registered API payloads, pages and image bytes,
// no network. Records which pages were requested.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::fetcher::WikiFetcher;

/// HashMap-based fetcher. Unregistered requests return `None`, like a failed fetch.
/// Builder pattern: `.on_api()`, `.on_page()`, `.on_bytes()`.
pub struct MockFetcher {
    api: Vec<(Vec<(String, String)>, Value)>,
    pages: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            api: Vec::new(),
            pages: HashMap::new(),
            bytes: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Answer any API call whose parameters include all of `params`.
    /// Earlier registrations win.
    pub fn on_api(mut self, params: &[(&str, &str)], payload: Value) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.api.push((params, payload));
        self
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn on_bytes(mut self, url: &str, bytes: &[u8]) -> Self {
        self.bytes.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Every page, API page title and download requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, what: String) {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(what);
        }
    }
}

#[async_trait]
impl WikiFetcher for MockFetcher {
    async fn api(&self, params: &[(&str, &str)]) -> Option<Value> {
        if let Some((_, page)) = params.iter().find(|(k, _)| matches!(*k, "page" | "titles")) {
            self.record(format!("api:{page}"));
        }
        self.api
            .iter()
            .find(|(wanted, _)| {
                wanted
                    .iter()
                    .all(|(k, v)| params.iter().any(|(pk, pv)| pk == k && pv == v))
            })
            .map(|(_, payload)| payload.clone())
    }

    async fn page(&self, url: &str) -> Option<String> {
        self.record(format!("page:{url}"));
        self.pages.get(url).cloned()
    }

    async fn download(&self, url: &str) -> Option<Vec<u8>> {
        self.record(format!("download:{url}"));
        self.bytes.get(url).cloned()
    }
}
