use thiserror::Error;

/// Errors surfaced by the crawl engine's single error channel.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("{limit} exhausted (capacity {capacity}) while inserting {url}")]
    CapacityExhausted {
        limit: &'static str,
        capacity: usize,
        url: String,
    },

    #[error("transport error {code} for {url}: {message}")]
    TransportError {
        code: i32,
        url: String,
        message: String,
    },

    #[error("content processor failed for {url}: {message}")]
    ParseWarning { url: String, message: String },

    #[error("robots.txt unavailable for {host}:{port}, treating as allow-all: {message}")]
    RobotsFetchNotice {
        host: String,
        port: u16,
        message: String,
    },

    #[error("crawl interrupted by signal")]
    Interrupted,

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type CrawlResult<T> = Result<T, CrawlError>;
