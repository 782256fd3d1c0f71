/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Browser failed: {0}")]
    Browser(String),
}
