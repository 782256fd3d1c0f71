use std::time::Duration;

use async_trait::async_trait;
use nightcity_core::file_config::WikiConfig;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::RequestCache;
use crate::error::{FetchError, Result};

/// Everything the pipeline needs from the wiki.
///
/// Each call returns `None` on any failure; the implementation logs it.
/// Callers skip the affected entity or signal and carry on.
#[async_trait]
pub trait WikiFetcher: Send + Sync {
    /// MediaWiki API call with the given query parameters.
    async fn api(&self, params: &[(&str, &str)]) -> Option<Value>;

    /// Raw HTML of an article page.
    async fn page(&self, url: &str) -> Option<String>;

    /// Raw bytes of an image. Never cached.
    async fn download(&self, url: &str) -> Option<Vec<u8>>;
}

/// Rate-limited, cached HTTP access to a MediaWiki site.
pub struct WikiClient {
    http: reqwest::Client,
    api_url: String,
    cache: RequestCache,
    request_delay: Duration,
    download_delay: Duration,
}

impl WikiClient {
    pub fn new(config: &WikiConfig, cache: RequestCache) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(
            api_url = %config.api_url,
            cache = cache.is_enabled(),
            delay_ms = config.request_delay_ms,
            "WikiClient initialized"
        );

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            cache,
            request_delay: Duration::from_millis(config.request_delay_ms),
            download_delay: Duration::from_millis(config.download_delay_ms),
        })
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    async fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self.send(url, query).await?;
        response.text().await.map_err(|e| classify(e, url))
    }

    /// Fixed pause, then a GET. Only reached on cache misses.
    async fn fetch_text(&self, url: &str, query: &[(&str, &str)]) -> Option<String> {
        tokio::time::sleep(self.request_delay).await;
        match self.get_text(url, query).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(url, error = %e, "Request failed");
                None
            }
        }
    }
}

fn classify(error: reqwest::Error, url: &str) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http(error)
    }
}

#[async_trait]
impl WikiFetcher for WikiClient {
    async fn api(&self, params: &[(&str, &str)]) -> Option<Value> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if !query.iter().any(|(k, _)| *k == "format") {
            query.push(("format", "json"));
        }
        let fingerprint = RequestCache::fingerprint_params(&query);

        let query_ref = &query;
        let body = self
            .cache
            .get_or_fetch("api", &fingerprint, "json", move || async move {
                self.fetch_text(&self.api_url, query_ref).await
            })
            .await?;

        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Malformed API payload, dropping cache entry");
                self.cache.invalidate("api", &fingerprint, "json").await;
                None
            }
        }
    }

    async fn page(&self, url: &str) -> Option<String> {
        let fingerprint = RequestCache::fingerprint(url);
        self.cache
            .get_or_fetch("page", &fingerprint, "html", move || async move {
                self.fetch_text(url, &[]).await
            })
            .await
    }

    async fn download(&self, url: &str) -> Option<Vec<u8>> {
        if url::Url::parse(url).is_err() {
            let e = FetchError::InvalidUrl {
                url: url.to_string(),
            };
            warn!(error = %e, "Skipping download");
            return None;
        }

        tokio::time::sleep(self.download_delay).await;
        let result = match self.send(url, &[]).await {
            Ok(response) => response.bytes().await.map_err(|e| classify(e, url)),
            Err(e) => Err(e),
        };
        match result {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url, error = %e, "Download failed");
                None
            }
        }
    }
}
