//! OpenAI HTTP payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};

use crate::ProviderError;

use super::types::{
    OpenAiFinishReason, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiRole, OpenAiUsage,
};

pub(crate) fn build_api_request(request: OpenAiRequest) -> Result<OpenAiApiRequest, ProviderError> {
    let messages = request
        .messages
        .into_iter()
        .map(OpenAiApiMessage::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    if messages.is_empty() {
        return Err(ProviderError::invalid_request(
            "OpenAI request requires at least one message",
        ));
    }

    Ok(OpenAiApiRequest {
        model: request.model,
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: request.stream,
    })
}

pub(crate) fn parse_finish_reason(value: Option<&str>) -> OpenAiFinishReason {
    match value {
        Some("stop") => OpenAiFinishReason::Stop,
        Some("length") => OpenAiFinishReason::Length,
        _ => OpenAiFinishReason::Other,
    }
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

/// Payload of one SSE `data:` line, or `None` for comments, blank lines and
/// other fields.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("data:")
        .map(|payload| payload.trim())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiErrorEnvelope {
    pub error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: &'static str,
    pub content: String,
}

impl TryFrom<OpenAiMessage> for OpenAiApiMessage {
    type Error = ProviderError;

    fn try_from(value: OpenAiMessage) -> Result<Self, Self::Error> {
        if value.content.trim().is_empty() && value.role != OpenAiRole::Assistant {
            return Err(ProviderError::invalid_request(
                "OpenAI message content must not be empty",
            ));
        }

        Ok(Self {
            role: value.role.as_str(),
            content: value.content,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiResponse {
    pub model: String,
    pub choices: Vec<OpenAiApiChoice>,
    pub usage: Option<OpenAiApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiChoice {
    pub message: OpenAiApiAssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiAssistantMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<OpenAiApiUsage> for OpenAiUsage {
    fn from(value: OpenAiApiUsage) -> Self {
        Self {
            prompt_tokens: value.prompt_tokens,
            completion_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

impl TryFrom<OpenAiApiResponse> for OpenAiResponse {
    type Error = ProviderError;

    fn try_from(value: OpenAiApiResponse) -> Result<Self, Self::Error> {
        let choice =
            value.choices.into_iter().next().ok_or_else(|| {
                ProviderError::transport("OpenAI response did not include choices")
            })?;

        Ok(Self {
            model: value.model,
            content: choice.message.content.unwrap_or_default(),
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
            usage: value.usage.map(OpenAiUsage::from).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamResponse {
    pub model: String,
    pub choices: Vec<OpenAiApiStreamChoice>,
    pub usage: Option<OpenAiApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamChoice {
    pub delta: OpenAiApiStreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamDelta {
    pub content: Option<String>,
}
