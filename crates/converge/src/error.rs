//! Error types for reconciliation and provider drivers.
//!
//! Driver errors are categorized so callers can log actionable advice.
//! The engine itself retries every wrapped provider call the same way:
//! permanent failures are retried too, since provider calls are idempotent.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::ProviderKind;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Categories of provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network failures and throttling
    Transient,
    /// Account or region limits reached
    Quota,
    /// Bad image id, flavor, or other rejected input
    InvalidInput,
    /// Resource does not exist
    NotFound,
    /// Change the provider cannot apply in place
    Unsupported,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Transient provider failure",
            Self::Quota => "Provider quota exceeded",
            Self::InvalidInput => "Request rejected by provider",
            Self::NotFound => "Resource not found",
            Self::Unsupported => "Change not supported in place",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transient => "Re-run reconciliation; the provider may be throttling requests",
            Self::Quota => "Raise the account quota or lower the declared count",
            Self::InvalidInput => "Check image, flavor and disk settings in the topology",
            Self::NotFound => "The resource may have been removed outside of hostfleet",
            Self::Unsupported => "Recreate the resource instead of modifying it",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors returned by provider drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Network, timeout or throttling error
    #[error("transient provider error: {message}")]
    Transient {
        /// Provider message
        message: String,
    },

    /// Quota exhausted
    #[error("quota exceeded: {message}")]
    Quota {
        /// Provider message
        message: String,
    },

    /// The provider rejected the request
    #[error("invalid request: {message}")]
    InvalidInput {
        /// What was rejected
        message: String,
    },

    /// A referenced resource does not exist
    #[error("not found: {resource}")]
    NotFound {
        /// Resource id or description
        resource: String,
    },

    /// The change cannot be performed, e.g. shrinking an attached volume
    #[error("unsupported change: {message}")]
    Unsupported {
        /// Why the change was refused
        message: String,
    },

    /// IO error on driver-local state
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Driver-local state could not be decoded
    #[error("invalid provider state in {path}: {source}")]
    State {
        /// State file
        path: PathBuf,
        /// Decode error
        #[source]
        source: serde_json::Error,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transient { .. } | Self::Io { .. } => ErrorCategory::Transient,
            Self::Quota { .. } => ErrorCategory::Quota,
            Self::InvalidInput { .. } => ErrorCategory::InvalidInput,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Unsupported { .. } => ErrorCategory::Unsupported,
            Self::State { .. } | Self::Other(_) => ErrorCategory::Other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A provider call for one host group failed
    #[error("{operation} failed for host group {index}: {source}")]
    Driver {
        /// Operation name, e.g. "create instances"
        operation: &'static str,
        /// Host group index
        index: usize,
        /// Driver error
        #[source]
        source: DriverError,
    },

    /// A provider call not tied to a single host group failed
    #[error("{operation} failed: {source}")]
    Provider {
        /// Operation name
        operation: &'static str,
        /// Driver error
        #[source]
        source: DriverError,
    },

    /// The only master group was declared with zero instances
    #[error("host group {index} holds the only master role and cannot be scaled to zero")]
    LoneMaster {
        /// Host group index
        index: usize,
    },

    /// Two declared groups share one index
    #[error("host group index {index} is declared more than once")]
    DuplicateIndex {
        /// Duplicated index
        index: usize,
    },

    /// Two disks of one group share a device path
    #[error("device {device} appears more than once in host group {index}")]
    DuplicateDevice {
        /// Host group index
        index: usize,
        /// Duplicated device
        device: String,
    },

    /// Provider name is not one of the known kinds
    #[error("unknown provider '{0}' (expected one of: memory, local, aws, aliyun)")]
    UnknownProvider(String),

    /// No constructor registered for the provider kind
    #[error("no driver registered for provider '{0}'")]
    ProviderNotRegistered(ProviderKind),

    /// Driver construction failed
    #[error("cannot set up provider '{provider}': {message}")]
    ProviderSetup {
        /// Provider kind
        provider: ProviderKind,
        /// What went wrong
        message: String,
    },

    /// The worker pool could not be built
    #[error("failed to create reconcile thread pool: {0}")]
    WorkerPool(String),

    /// A pass failed after it created the owner's key pair
    ///
    /// Sibling groups may already run instances with the new key, and the
    /// provider will not hand out the material again.
    #[error("{error}")]
    Incomplete {
        /// First group error of the pass
        error: Box<Error>,
        /// Private key material of the new key pair
        private_key: String,
    },
}

impl Error {
    /// Host group the error is attributed to, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Driver { index, .. }
            | Self::LoneMaster { index }
            | Self::DuplicateIndex { index }
            | Self::DuplicateDevice { index, .. } => Some(*index),
            Self::Incomplete { error, .. } => error.index(),
            _ => None,
        }
    }

    /// The failure itself, without any [`Error::Incomplete`] wrapper
    pub fn root(&self) -> &Self {
        match self {
            Self::Incomplete { error, .. } => error.root(),
            _ => self,
        }
    }

    /// Key material created by the failed pass, if any
    pub fn private_key(&self) -> Option<&str> {
        match self {
            Self::Incomplete { private_key, .. } => Some(private_key),
            _ => None,
        }
    }

    /// Underlying driver error category, if this came from a provider call
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Driver { source, .. } | Self::Provider { source, .. } => {
                Some(source.category())
            }
            Self::Incomplete { error, .. } => error.category(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(DriverError::transient("throttled").is_retryable());
        assert!(!DriverError::invalid("bad image").is_retryable());
        assert!(
            !DriverError::Quota {
                message: "limit".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_message_names_group_and_operation() {
        let err = Error::Driver {
            operation: "create instances",
            index: 2,
            source: DriverError::transient("timeout"),
        };
        assert_eq!(
            err.to_string(),
            "create instances failed for host group 2: transient provider error: timeout"
        );
        assert_eq!(err.index(), Some(2));
        assert_eq!(err.category(), Some(ErrorCategory::Transient));
    }

    #[test]
    fn test_incomplete_delegates_to_wrapped_error() {
        let err = Error::Incomplete {
            error: Box::new(Error::Driver {
                operation: "create instances",
                index: 1,
                source: DriverError::invalid("no image"),
            }),
            private_key: "key-material".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "create instances failed for host group 1: invalid request: no image"
        );
        assert_eq!(err.index(), Some(1));
        assert_eq!(err.category(), Some(ErrorCategory::InvalidInput));
        assert_eq!(err.private_key(), Some("key-material"));
        assert!(matches!(err.root(), Error::Driver { index: 1, .. }));
        assert_eq!(Error::LoneMaster { index: 0 }.private_key(), None);
    }
}
