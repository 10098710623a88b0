//! Directory backend error types.

/// Errors reported by a [`DirectoryClient`](super::DirectoryClient).
///
/// The type is `Clone` because a single in-flight backend call is shared by
/// every caller that joined it, and each of them receives the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The resource, item or principal does not exist on the backend.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend did not answer in time.
    #[error("Backend timeout: {0}")]
    Timeout(String),

    /// The backend could not be reached or refused the connection.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend throttled the request.
    #[error("Rate limited by backend")]
    RateLimited,

    /// The backend answered with an error status.
    #[error("Backend returned HTTP {status}: {message}")]
    Status {
        /// HTTP-like status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },

    /// The backend response could not be interpreted.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Any other failure, including a fetch task that did not complete.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Creates a new `Other` error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns `true` if the failure is likely to go away on retry.
    ///
    /// - Timeouts, unreachable backends and throttling are transient
    /// - 5xx statuses are transient, 4xx are not
    /// - Not-found and malformed responses are permanent
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Unavailable(_) | Self::RateLimited => true,
            Self::Status { status, .. } => (500..600).contains(status),
            Self::NotFound(_) | Self::InvalidResponse(_) | Self::Other(_) => false,
        }
    }
}

/// Result alias for directory backend calls.
pub type BackendResult<T> = Result<T, BackendError>;
