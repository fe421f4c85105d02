//! Error types for the acquisition pipeline.
//!
//! Every fallible operation in this crate returns [`AcquireError`]. The
//! network-facing variants ([`AcquireError::Transport`] and
//! [`AcquireError::Protocol`]) are local to a single source attempt and are
//! absorbed by the fallback chain; [`AcquireError::Exhausted`] is absorbed by
//! the pipeline's synthetic leaf. Only the sinks and configuration loading
//! surface errors to callers.

use std::fmt;

use thiserror::Error;

/// Coarse classification of an [`AcquireError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure, timeout or cancellation.
    Transport,
    /// Non-success status or payload, malformed or unusable body.
    Protocol,
    /// Every configured source failed.
    Exhaustion,
    /// Configuration, I/O and data-conversion errors.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Exhaustion => "exhaustion",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Why a single source in the fallback chain was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    /// Identifier of the source descriptor that failed.
    pub source_id: String,
    /// Kind of the underlying error.
    pub kind: ErrorKind,
    /// Human-readable reason.
    pub reason: String,
}

impl SourceFailure {
    pub(crate) fn from_error(source_id: impl Into<String>, error: &AcquireError) -> Self {
        Self {
            source_id: source_id.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.source_id, self.kind, self.reason)
    }
}

/// The main error type for the acquisition crate.
#[derive(Error, Debug)]
pub enum AcquireError {
    /// The request never produced a usable HTTP response.
    #[error("Transport error: {message}")]
    Transport {
        /// Detailed error message
        message: String,
    },

    /// The server answered, but not with a usable table.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Detailed error message
        message: String,
        /// HTTP status when the server answered with a non-2xx code
        status: Option<u16>,
    },

    /// Every alternative source failed.
    #[error("All {} sources exhausted{}", .failures.len(), format_failures(.failures))]
    Exhausted {
        /// Per-source failure reasons, in the order the sources were tried
        failures: Vec<SourceFailure>,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let joined = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(": {joined}")
}

/// A type alias for `Result<T, AcquireError>`.
pub type Result<T> = std::result::Result<T, AcquireError>;

impl AcquireError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol error for a well-formed but unusable response.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a protocol error for a non-2xx HTTP status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            message: format!("HTTP {status}: {}", message.into()),
            status: Some(status),
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AcquireError::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcquireError::Transport { .. } => ErrorKind::Transport,
            AcquireError::Protocol { .. } | AcquireError::Serialization(_) => ErrorKind::Protocol,
            AcquireError::Exhausted { .. } => ErrorKind::Exhaustion,
            _ => ErrorKind::Other,
        }
    }

    /// Returns true if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Transport { .. } => true,
            AcquireError::Protocol {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for AcquireError {
    fn from(e: serde_json::Error) -> Self {
        AcquireError::Serialization(e.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AcquireError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                AcquireError::Transport { message } => AcquireError::Transport {
                    message: format!("{msg}: {message}"),
                },
                AcquireError::Protocol { message, status } => AcquireError::Protocol {
                    message: format!("{msg}: {message}"),
                    status,
                },
                AcquireError::Configuration(inner) => {
                    AcquireError::Configuration(format!("{msg}: {inner}"))
                }
                other => AcquireError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AcquireError::transport("timeout").kind(), ErrorKind::Transport);
        assert_eq!(AcquireError::protocol("bad").kind(), ErrorKind::Protocol);
        assert_eq!(
            AcquireError::Exhausted { failures: vec![] }.kind(),
            ErrorKind::Exhaustion
        );
        assert_eq!(
            AcquireError::Configuration("x".to_string()).kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(AcquireError::transport("connection refused").is_retryable());
        assert!(AcquireError::http_status(503, "busy").is_retryable());
        assert!(AcquireError::http_status(429, "slow down").is_retryable());
        assert!(!AcquireError::http_status(404, "not found").is_retryable());
        assert!(!AcquireError::protocol("success flag was false").is_retryable());
        assert!(!AcquireError::Configuration("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_exhausted_display_lists_failures() {
        let err = AcquireError::Exhausted {
            failures: vec![
                SourceFailure::from_error("portal-csv", &AcquireError::protocol("HTTP 404")),
                SourceFailure::from_error("national-csv", &AcquireError::transport("timed out")),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("All 2 sources exhausted"));
        assert!(text.contains("portal-csv (protocol)"));
        assert!(text.contains("national-csv (transport)"));
    }

    #[test]
    fn test_error_context_keeps_kind() {
        fn failing() -> Result<()> {
            Err(AcquireError::protocol("success flag was false"))
        }

        let err = failing().context("page at offset 1000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("page at offset 1000"));
    }

    #[test]
    fn test_error_context_wraps_foreign_errors() {
        let io: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        let err = io.context("writing output").unwrap_err();
        assert!(matches!(err, AcquireError::Internal(_)));
        assert!(err.to_string().contains("writing output"));
    }
}
