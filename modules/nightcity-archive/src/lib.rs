pub mod browser;
pub mod cache;
pub mod error;
pub mod fetcher;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use browser::{ChromeEnricher, ImageEnricher, NoopEnricher};
pub use cache::RequestCache;
pub use error::{FetchError, Result};
pub use fetcher::{WikiClient, WikiFetcher};
