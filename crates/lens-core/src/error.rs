//! Error handling for gpulens
//!
//! Provides a unified error type and result type for use across all gpulens
//! components. Nothing in the engine may abort the triggering job or the
//! surrounding pipeline: callers translate these errors into dropped
//! payloads or explicitly partial results.

/// Result type alias for gpulens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for gpulens
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed ingest payload; the payload is discarded whole
    #[error("Schema error: {0}")]
    Schema(String),

    /// Backing store rejected or lost an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Operation exceeded its bounded timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Resource temporarily unavailable
    #[error("Resource unavailable: {0}")]
    Unavailable(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Store(_) | Error::Unavailable(_) | Error::Timeout(_)
        )
    }

    /// Check if this error means the input itself was bad
    ///
    /// Schema errors drop the payload; retrying the same payload can never
    /// succeed.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::Schema(_) | Error::Json(_) | Error::InvalidConfiguration(_)
        )
    }

    /// Get the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Schema(_) => "schema",
            Error::Store(_) => "store",
            Error::InvalidConfiguration(_) => "configuration",
            Error::Timeout(_) => "timeout",
            Error::Unavailable(_) => "unavailable",
            Error::NotFound(_) => "not_found",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Other(_) => "other",
        }
    }
}

/// Extension trait for adding context to Results
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context(self, context: impl Into<String>) -> Result<T>;

    /// Add context to an error using a closure
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", context.into(), original_error))
        })
    }

    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", f(), original_error))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::schema("missing job_id");
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(err.to_string(), "Schema error: missing job_id");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::schema("test").category(), "schema");
        assert_eq!(Error::store("test").category(), "store");
        assert_eq!(Error::timeout("test").category(), "timeout");
    }

    #[test]
    fn test_error_classification() {
        let input_err = Error::schema("bad payload");
        assert!(input_err.is_input_error());
        assert!(!input_err.is_retryable());

        let store_err = Error::store("backend down");
        assert!(!store_err.is_input_error());
        assert!(store_err.is_retryable());
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let err = result.with_context("failed to read results file").unwrap_err();

        assert!(matches!(err, Error::Other(_)));
        assert!(err.to_string().contains("failed to read results file"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_context_fn() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "original error",
        ));

        let err = result
            .with_context_fn(|| format!("emit failed for job {}", "1234"))
            .unwrap_err();

        assert!(err.to_string().contains("emit failed for job 1234"));
        assert!(err.to_string().contains("original error"));
    }
}
