// Optional headless-browser pass for images injected by client-side scripts.
//
// Runs in its own child process with a throwaway profile. Any failure
// degrades to "no extra images".

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use nightcity_core::file_config::BrowserConfig;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::error::{FetchError, Result};

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));

/// Extra image URLs for a page, beyond what static HTML exposes.
#[async_trait]
pub trait ImageEnricher: Send + Sync {
    async fn images(&self, url: &str) -> Vec<String>;
}

/// Enricher used when browser rendering is off.
pub struct NoopEnricher;

#[async_trait]
impl ImageEnricher for NoopEnricher {
    async fn images(&self, _url: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Renders the page with headless Chromium (`--dump-dom`) and collects image URLs.
pub struct ChromeEnricher {
    binary: String,
    timeout: Duration,
    host_filter: String,
}

impl ChromeEnricher {
    pub fn new(config: &BrowserConfig) -> Self {
        info!(binary = %config.binary, timeout_secs = config.timeout_secs, "ChromeEnricher initialized");
        Self {
            binary: config.binary.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            host_filter: config.host_filter.clone(),
        }
    }

    async fn run_chrome(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let profile = tempfile::tempdir()
            .map_err(|e| FetchError::Browser(format!("Failed to create temp profile dir: {e}")))?;

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    &format!("--user-data-dir={}", profile.path().display()),
                    "--dump-dom",
                    url,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => Ok(output.stdout),
            Ok(Ok(output)) => Err(FetchError::Browser(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Ok(Err(e)) => Err(FetchError::Browser(format!("failed to launch {}: {e}", self.binary))),
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ImageEnricher for ChromeEnricher {
    async fn images(&self, url: &str) -> Vec<String> {
        match self.run_chrome(url).await {
            Ok(dom) if !dom.is_empty() => {
                let html = String::from_utf8_lossy(&dom);
                let found = image_sources(&html, &self.host_filter);
                info!(url, images = found.len(), "Browser pass finished");
                found
            }
            Ok(_) => {
                warn!(url, "Browser returned an empty DOM");
                Vec::new()
            }
            Err(e) => {
                warn!(url, error = %e, "Browser pass failed");
                Vec::new()
            }
        }
    }
}

/// `src`/`data-src` of every `img` hosted on `host`, deduplicated in document order.
pub fn image_sources(html: &str, host: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for img in document.select(&IMG_SELECTOR) {
        for attr in ["src", "data-src"] {
            let Some(raw) = img.value().attr(attr) else {
                continue;
            };
            let absolute = match raw.strip_prefix("//") {
                Some(rest) => format!("https://{rest}"),
                None => raw.to_string(),
            };
            let on_host = url::Url::parse(&absolute)
                .ok()
                .and_then(|u| u.host_str().map(|h| h == host || h.ends_with(&format!(".{host}"))))
                .unwrap_or(false);
            if on_host && seen.insert(absolute.clone()) {
                found.push(absolute);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_hosted_images() {
        let html = r#"<html><body>
            <img src="//static.wikia.nocookie.net/cyberpunk/images/a/ab/Judy.png/revision/latest">
            <img src="data:image/gif;base64,R0lGOD" data-src="https://static.wikia.nocookie.net/cyberpunk/images/c/cd/Judy_2.jpg">
            <img src="https://ads.example.com/banner.png">
            <img src="//static.wikia.nocookie.net/cyberpunk/images/a/ab/Judy.png/revision/latest">
        </body></html>"#;

        let found = image_sources(html, "static.wikia.nocookie.net");
        assert_eq!(
            found,
            vec![
                "https://static.wikia.nocookie.net/cyberpunk/images/a/ab/Judy.png/revision/latest",
                "https://static.wikia.nocookie.net/cyberpunk/images/c/cd/Judy_2.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_degrades_to_nothing() {
        let enricher = ChromeEnricher::new(&BrowserConfig {
            binary: "/nonexistent/chromium-for-tests".to_string(),
            ..BrowserConfig::default()
        });
        assert!(enricher.images("https://cyberpunk.fandom.com/wiki/Judy_Alvarez").await.is_empty());
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let enricher = ChromeEnricher::new(&BrowserConfig::default());
        assert!(enricher.images("file:///etc/passwd").await.is_empty());
    }
}
