//! Permission cache error types.
//!
//! Read paths never surface these errors: they are absorbed into a
//! fail-closed [`PermissionResult`](crate::PermissionResult),
//! [`ActorProfile`](crate::ActorProfile) or
//! [`ResourcePermissions`](crate::ResourcePermissions) with `error` set.
//! Only setup problems are returned to the caller.

use std::fmt;

use crate::backend::BackendError;

/// Errors that can occur while constructing or querying a permission resolver.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The resolver or cache configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The directory backend failed to answer a query.
    #[error("Backend error: {source}")]
    Backend {
        /// The underlying backend failure.
        #[from]
        source: BackendError,
    },

    /// A permission level name could not be mapped to a permission kind.
    #[error("Unknown permission level: {level}")]
    UnknownLevel {
        /// The level name as supplied by the caller.
        level: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `UnknownLevel` error.
    #[must_use]
    pub fn unknown_level(level: impl Into<String>) -> Self {
        Self::UnknownLevel {
            level: level.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { source } => source.is_transient(),
            _ => false,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::UnknownLevel { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid setup, fatal at construction.
    Configuration,
    /// Directory backend or network failures.
    Backend,
    /// Caller supplied an unrecognized name.
    Validation,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Backend => write!(f, "backend"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
