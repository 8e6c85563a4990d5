//! Shared provider error kinds and error value helpers.
//!
//! ```rust
//! use sprovider::ProviderError;
//!
//! let auth = ProviderError::authentication("bad key");
//! assert!(auth.rotates_credential());
//!
//! let invalid = ProviderError::invalid_request("empty conversation");
//! assert!(!invalid.rotates_credential());
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    UnknownProvider,
    Exhausted,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message, true)
    }

    pub fn unknown_provider(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::UnknownProvider, message, false)
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Exhausted, message, false)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }

    /// Whether the failure implicates the credential used for the attempt.
    ///
    /// Malformed requests fail the same way under every key, so they do not
    /// mark the credential failed and are not retried with the next one.
    pub fn rotates_credential(&self) -> bool {
        !matches!(
            self.kind,
            ProviderErrorKind::InvalidRequest
                | ProviderErrorKind::UnknownProvider
                | ProviderErrorKind::Exhausted
        )
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ProviderError {}
