//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use sprovider::{ProviderError, ProviderErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// The request was rejected before any state changed.
    Validation,
    UnknownProvider,
    /// Every credential in the provider's pool failed during one turn.
    Exhausted,
    Provider,
    Timeout,
    Cancelled,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Validation, message)
    }

    pub fn unknown_provider(details: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::UnknownProvider, "Unknown service").with_details(details)
    }

    pub fn exhausted(details: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Exhausted, "all provider credentials exhausted")
            .with_details(details)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Provider, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Cancelled, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message)
    }

    /// Whether the caller, not the gateway or a provider, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ChatErrorKind::Validation | ChatErrorKind::UnknownProvider
        )
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }

        Ok(())
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        match value.kind {
            ProviderErrorKind::UnknownProvider => ChatError::unknown_provider(value.message),
            ProviderErrorKind::Exhausted => ChatError::exhausted(value.message),
            _ => ChatError::provider("provider request failed").with_details(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_chat_kinds() {
        let unknown = ChatError::from(ProviderError::unknown_provider("unknown provider 'gemini'"));
        assert_eq!(unknown.kind, ChatErrorKind::UnknownProvider);
        assert_eq!(unknown.message, "Unknown service");
        assert!(unknown.is_client_error());

        let exhausted = ChatError::from(ProviderError::exhausted("quota exceeded"));
        assert_eq!(exhausted.kind, ChatErrorKind::Exhausted);
        assert_eq!(exhausted.message, "all provider credentials exhausted");
        assert_eq!(exhausted.details.as_deref(), Some("quota exceeded"));
        assert!(!exhausted.is_client_error());

        let rejected = ChatError::from(ProviderError::invalid_request("context too long"));
        assert_eq!(rejected.kind, ChatErrorKind::Provider);
        assert_eq!(
            rejected.details.as_deref(),
            Some("InvalidRequest: context too long")
        );
    }

    #[test]
    fn display_appends_details_when_present() {
        assert_eq!(
            ChatError::validation("Message is required").to_string(),
            "Validation: Message is required"
        );
        assert_eq!(
            ChatError::exhausted("503").to_string(),
            "Exhausted: all provider credentials exhausted (503)"
        );
    }
}
