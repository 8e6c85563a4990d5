//! Anthropic Messages API adapter.
//!
//! Claude is driven in complete-only mode: the adapter returns one
//! [`ModelResponse`] and the normalizer decomposes it into fragments. The
//! persona prompt is lifted out of the conversation into the request's
//! top-level `system` field.

use std::sync::Arc;

use reqwest::{Client, Response};
use scommon::GenerationOptions;
use serde::{Deserialize, Serialize};

use crate::adapters::http::{error_for_status, send_error};
use crate::{
    Credential, Message, ModelProvider, ModelResponse, ProviderCapabilities, ProviderError,
    ProviderFuture, ProviderId, ProviderRequest, RawResponse, Role, SecretString, StopReason,
    TokenUsage,
};

pub const CLAUDE_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_CLAUDE_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ClaudeRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ClaudeMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaudeMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeResponse {
    pub model: String,
    pub text: String,
    pub stop_reason: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ClaudeResponse {
    fn into_model_response(self) -> ModelResponse {
        let stop_reason = match self.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => StopReason::EndTurn,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::Other,
        };

        ModelResponse {
            provider: ProviderId::Claude,
            model: self.model,
            content: self.text,
            stop_reason,
            usage: TokenUsage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                total_tokens: self.input_tokens + self.output_tokens,
            },
        }
    }
}

pub trait ClaudeTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: ClaudeRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ClaudeResponse, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct ClaudeHttpTransport {
    client: Client,
    base_url: String,
    version: String,
}

impl ClaudeHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: CLAUDE_BASE_URL.to_string(),
            version: ANTHROPIC_VERSION.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ClaudeApiErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("Claude request failed with status {status}"));

        error_for_status(status, message)
    }
}

impl ClaudeTransport for ClaudeHttpTransport {
    fn complete<'a>(
        &'a self,
        request: ClaudeRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ClaudeResponse, ProviderError>> {
        Box::pin(async move {
            let api_request = ClaudeApiRequest::from(request);
            let response = self
                .client
                .post(self.endpoint("messages"))
                .header("x-api-key", api_key.expose())
                .header("anthropic-version", self.version.as_str())
                .json(&api_request)
                .send()
                .await
                .map_err(send_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let parsed: ClaudeApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            Ok(parsed.into())
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    transport: Arc<dyn ClaudeTransport>,
    model: String,
    options: GenerationOptions,
}

impl ClaudeProvider {
    pub fn new(transport: Arc<dyn ClaudeTransport>) -> Self {
        Self {
            transport,
            model: DEFAULT_CLAUDE_MODEL.to_string(),
            options: GenerationOptions::default().with_max_tokens(DEFAULT_CLAUDE_MAX_TOKENS),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces generation options. `max_tokens` falls back to
    /// [`DEFAULT_CLAUDE_MAX_TOKENS`] when unset since the API requires it.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    fn build_claude_request(&self, request: ProviderRequest) -> ClaudeRequest {
        ClaudeRequest {
            model: request.model,
            system: request.system,
            messages: request
                .messages
                .into_iter()
                .map(|message| ClaudeMessage {
                    role: message.role.as_str(),
                    content: message.content,
                })
                .collect(),
            max_tokens: request
                .options
                .max_tokens
                .unwrap_or(DEFAULT_CLAUDE_MAX_TOKENS),
            temperature: request.options.temperature,
        }
    }
}

impl ModelProvider for ClaudeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Claude
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::COMPLETE_ONLY
    }

    /// System messages are joined into the out-of-band `system` field. Turns
    /// before the first user message are dropped because the Messages API
    /// requires the conversation to open with a user turn.
    fn build_request(
        &self,
        conversation: &[Message],
        credential: &Credential,
    ) -> Result<ProviderRequest, ProviderError> {
        let system = conversation
            .iter()
            .filter(|message| message.role == Role::System)
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = conversation
            .iter()
            .filter(|message| message.role != Role::System)
            .skip_while(|message| message.role != Role::User)
            .cloned()
            .collect::<Vec<_>>();

        let mut request = ProviderRequest::new(
            ProviderId::Claude,
            self.model.clone(),
            messages,
            credential.clone(),
        )
        .with_options(self.options);
        if !system.is_empty() {
            request = request.with_system(system);
        }

        request.validate()?;
        Ok(request)
    }

    fn invoke<'a>(
        &'a self,
        request: ProviderRequest,
    ) -> ProviderFuture<'a, Result<RawResponse<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let api_key = request.credential.secret().clone();
            let claude_request = self.build_claude_request(request);
            let response = self.transport.complete(claude_request, api_key).await?;
            Ok(RawResponse::Complete(response.into_model_response()))
        })
    }
}

#[derive(Debug, Serialize)]
struct ClaudeApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl From<ClaudeRequest> for ClaudeApiRequest {
    fn from(value: ClaudeRequest) -> Self {
        Self {
            model: value.model,
            max_tokens: value.max_tokens,
            system: value.system,
            messages: value.messages,
            temperature: value.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    model: String,
    content: Vec<ClaudeApiContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ClaudeApiUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiContentBlock {
    r#type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ClaudeApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<ClaudeApiResponse> for ClaudeResponse {
    fn from(value: ClaudeApiResponse) -> Self {
        let text = value
            .content
            .into_iter()
            .filter(|block| block.r#type == "text")
            .map(|block| block.text)
            .collect::<String>();

        Self {
            model: value.model,
            text,
            stop_reason: value.stop_reason,
            input_tokens: value.usage.input_tokens,
            output_tokens: value.usage.output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaudeApiErrorEnvelope {
    error: ClaudeApiError,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiError {
    message: String,
}
