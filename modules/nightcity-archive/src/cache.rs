use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Content-addressed on-disk store for raw responses.
///
/// One file per fingerprint, no expiry. Deleting the directory is the only
/// invalidation. A disabled cache always calls through.
#[derive(Debug, Clone)]
pub struct RequestCache {
    dir: PathBuf,
    enabled: bool,
}

impl RequestCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// SHA-256 over the JSON form of `key`.
    pub fn fingerprint<K: Serialize + ?Sized>(key: &K) -> String {
        let bytes = serde_json::to_vec(key).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Fingerprint of request parameters, independent of their order.
    pub fn fingerprint_params(params: &[(&str, &str)]) -> String {
        let sorted: BTreeMap<&str, &str> = params.iter().copied().collect();
        Self::fingerprint(&sorted)
    }

    fn entry_path(&self, namespace: &str, fingerprint: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{namespace}_{fingerprint}.{ext}"))
    }

    /// Return the cached payload, or run `fetch` and persist what it returns.
    ///
    /// `fetch` returning `None` caches nothing. A failed cache write is
    /// logged and the fresh payload is still returned.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        namespace: &str,
        fingerprint: &str,
        ext: &str,
        fetch: F,
    ) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        let path = self.entry_path(namespace, fingerprint, ext);
        match tokio::fs::read_to_string(&path).await {
            Ok(cached) => {
                debug!(namespace, fingerprint, "Cache hit");
                return Some(cached);
            }
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), error = %e, "Unreadable cache entry, refetching");
            }
            Err(_) => {}
        }

        let payload = fetch().await?;

        if let Err(e) = self.store(&path, &payload).await {
            warn!(path = %path.display(), error = %e, "Failed to write cache entry");
        }
        Some(payload)
    }

    async fn store(&self, path: &Path, payload: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, payload).await
    }

    /// Drop one entry, e.g. after its payload turned out to be unparseable.
    pub async fn invalidate(&self, namespace: &str, fingerprint: &str, ext: &str) {
        if !self.enabled {
            return;
        }
        let path = self.entry_path(namespace, fingerprint, ext);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to drop cache entry");
            }
        }
    }
}
