//! Provider-agnostic message, request, and response model types.
//!
//! ```rust
//! use sprovider::{Message, ProviderErrorKind, ProviderId, Role};
//!
//! let id: ProviderId = "anthropic".parse().expect("alias should parse");
//! assert_eq!(id, ProviderId::Claude);
//!
//! let err = "gemini".parse::<ProviderId>().expect_err("unknown provider");
//! assert_eq!(err.kind, ProviderErrorKind::UnknownProvider);
//!
//! let message = Message::new(Role::User, "hello");
//! assert_eq!(message.role.as_str(), "user");
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use scommon::GenerationOptions;

use crate::{Credential, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
    Claude,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::OpenAi, ProviderId::Claude];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Claude),
            other => Err(ProviderError::unknown_provider(format!(
                "unknown provider '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub provider: ProviderId,
    pub model: String,
    pub content: String,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// A conversation snapshot shaped for one provider and bound to one credential.
///
/// `system` is populated only by adapters that send the persona prompt out of
/// band; inline adapters keep it as the first entry of `messages`.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub provider: ProviderId,
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
    pub credential: Credential,
}

impl ProviderRequest {
    pub fn new(
        provider: ProviderId,
        model: impl Into<String>,
        messages: Vec<Message>,
        credential: Credential,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system: None,
            messages,
            options: GenerationOptions::default(),
            credential,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::invalid_request("model must not be empty"));
        }

        if self.messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "at least one message is required",
            ));
        }

        if let Some(max_tokens) = self.options.max_tokens
            && max_tokens == 0
        {
            return Err(ProviderError::invalid_request(
                "max_tokens must be greater than zero",
            ));
        }

        if let Some(temperature) = self.options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::invalid_request(
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        Ok(())
    }
}
