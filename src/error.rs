//! Error types for the shellcraft ingestion pipeline.

use shellcraft_search::SearchError;

/// Top-level error type for search, storage and ingestion.
#[derive(Debug, thiserror::Error)]
pub enum ShellcraftError {
    /// Search orchestration error (blank query, invalid search config).
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Asset download failed (HTTP error, timeout, empty body).
    #[error("download error: {0}")]
    Download(String),

    /// Image decode or re-encode failed.
    #[error("image error: {0}")]
    Image(String),

    /// Metadata document could not be read, parsed or written.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ShellcraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_errors_convert() {
        let err: ShellcraftError = SearchError::Config("query must not be empty".into()).into();
        assert!(matches!(err, ShellcraftError::Search(_)));
        assert!(err.to_string().contains("query must not be empty"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ShellcraftError = io.into();
        assert_eq!(err.to_string(), "I/O error: read-only");
    }
}
