//! OpenAI provider implementation over transport and shared models.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use scommon::GenerationOptions;

use crate::{
    BoxedEventStream, Credential, Message, ModelProvider, ProviderCapabilities, ProviderError,
    ProviderFuture, ProviderId, ProviderRequest, RawResponse, StreamEvent,
};

use super::transport::OpenAiTransport;
use super::types::{OpenAiMessage, OpenAiRequest};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Chat-completions adapter. The persona prompt travels inline as the first
/// `system` message.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    transport: Arc<dyn OpenAiTransport>,
    model: String,
    options: GenerationOptions,
    native_streaming: bool,
}

impl OpenAiProvider {
    pub fn new(transport: Arc<dyn OpenAiTransport>) -> Self {
        Self {
            transport,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            options: GenerationOptions::default(),
            native_streaming: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Disables SSE and returns whole completions instead.
    pub fn with_native_streaming(mut self, native_streaming: bool) -> Self {
        self.native_streaming = native_streaming;
        self
    }

    pub(crate) fn build_openai_request(&self, request: ProviderRequest) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(OpenAiMessage::from(Message::system(system)));
        }
        messages.extend(request.messages.into_iter().map(OpenAiMessage::from));

        OpenAiRequest {
            model: request.model,
            messages,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream: self.native_streaming,
        }
    }
}

impl ModelProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn capabilities(&self) -> ProviderCapabilities {
        if self.native_streaming {
            ProviderCapabilities::STREAMING
        } else {
            ProviderCapabilities::COMPLETE_ONLY
        }
    }

    fn build_request(
        &self,
        conversation: &[Message],
        credential: &Credential,
    ) -> Result<ProviderRequest, ProviderError> {
        let request = ProviderRequest::new(
            ProviderId::OpenAi,
            self.model.clone(),
            conversation.to_vec(),
            credential.clone(),
        )
        .with_options(self.options);

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
            let openai_request = self.build_openai_request(request);

            if !self.native_streaming {
                let response = self.transport.complete(openai_request, api_key).await?;
                return Ok(RawResponse::Complete(response.into_model_response()));
            }

            let mut chunks = self.transport.stream(openai_request, api_key).await?;
            let stream = try_stream! {
                while let Some(chunk) = chunks.next().await {
                    yield StreamEvent::from(chunk?);
                }
            };

            Ok(RawResponse::Stream(Box::pin(stream) as BoxedEventStream<'a>))
        })
    }
}
