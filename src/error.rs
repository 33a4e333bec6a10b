//! Error types for Vigil

use thiserror::Error;

/// Main error type for Vigil operations
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Crawl error: {0}")]
    CrawlError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Module '{0}' failed: {1}")]
    ModuleError(String, String),

    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    #[error("Scan cancelled")]
    Cancelled,
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
