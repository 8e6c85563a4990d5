//! OpenAI adapter types and provider-agnostic conversion logic.

use crate::{Message, ModelResponse, ProviderId, Role, StopReason, StreamEvent, TokenUsage};

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiMessage {
    pub role: OpenAiRole,
    pub content: String,
}

impl From<Message> for OpenAiMessage {
    fn from(value: Message) -> Self {
        Self {
            role: value.role.into(),
            content: value.content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiRole {
    System,
    User,
    Assistant,
}

impl OpenAiRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl From<Role> for OpenAiRole {
    fn from(value: Role) -> Self {
        match value {
            Role::System => Self::System,
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiResponse {
    pub model: String,
    pub content: String,
    pub finish_reason: OpenAiFinishReason,
    pub usage: OpenAiUsage,
}

impl OpenAiResponse {
    pub(crate) fn into_model_response(self) -> ModelResponse {
        ModelResponse {
            provider: ProviderId::OpenAi,
            model: self.model,
            content: self.content,
            stop_reason: self.finish_reason.into(),
            usage: self.usage.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiFinishReason {
    Stop,
    Length,
    Other,
}

impl From<OpenAiFinishReason> for StopReason {
    fn from(value: OpenAiFinishReason) -> Self {
        match value {
            OpenAiFinishReason::Stop => Self::EndTurn,
            OpenAiFinishReason::Length => Self::MaxTokens,
            OpenAiFinishReason::Other => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenAiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(value: OpenAiUsage) -> Self {
        Self {
            input_tokens: value.prompt_tokens,
            output_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAiStreamChunk {
    TextDelta(String),
    MessageComplete(String),
    ResponseComplete(OpenAiResponse),
}

impl From<OpenAiStreamChunk> for StreamEvent {
    fn from(value: OpenAiStreamChunk) -> Self {
        match value {
            OpenAiStreamChunk::TextDelta(delta) => Self::TextDelta(delta),
            OpenAiStreamChunk::MessageComplete(content) => {
                Self::MessageComplete(Message::assistant(content))
            }
            OpenAiStreamChunk::ResponseComplete(response) => {
                Self::ResponseComplete(response.into_model_response())
            }
        }
    }
}
