//! OpenAI transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response};

use crate::adapters::http::{error_for_status, send_error};
use crate::{ProviderError, ProviderFuture, SecretString};

use super::serde_api::{
    OpenAiApiResponse, OpenAiApiStreamResponse, build_api_request, extract_error_message,
    parse_finish_reason, sse_data,
};
use super::types::{
    OpenAiFinishReason, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiUsage,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub type OpenAiChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<OpenAiStreamChunk, ProviderError>> + Send + 'a>>;

pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: OpenAiRequest,
        api_key: &SecretString,
    ) -> Result<Response, ProviderError> {
        let api_request = build_api_request(request)?;
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(api_key.expose())
            .json(&api_request)
            .send()
            .await
            .map_err(send_error)?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        Ok(response)
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("OpenAI request failed with status {status}"));

        error_for_status(status, message)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        mut request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let response = self.send(request, &api_key).await?;
            let parsed: OpenAiApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            OpenAiResponse::try_from(parsed)
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let model_for_fallback = request.model.clone();
            let response = self.send(request, &api_key).await?;

            let stream = try_stream! {
                let mut chunks = response.bytes_stream();
                // Raw bytes, so a multi-byte character split across network
                // chunks is only decoded once its line is complete.
                let mut sse_buffer: Vec<u8> = Vec::new();
                let mut finished = false;
                let mut content = String::new();
                let mut model = None::<String>;
                let mut finish_reason = OpenAiFinishReason::Other;
                let mut usage = OpenAiUsage::default();

                while let Some(item) = chunks.next().await {
                    let bytes = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    sse_buffer.extend_from_slice(&bytes);

                    while let Some(newline_index) = sse_buffer.iter().position(|byte| *byte == b'\n') {
                        let line = sse_buffer.drain(..=newline_index).collect::<Vec<_>>();
                        let line = std::str::from_utf8(&line)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        let Some(payload) = sse_data(line) else {
                            continue;
                        };

                        if payload == "[DONE]" {
                            finished = true;
                            break;
                        }

                        let parsed: OpenAiApiStreamResponse = serde_json::from_str(payload)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        if model.is_none() {
                            model = Some(parsed.model.clone());
                        }

                        if let Some(api_usage) = parsed.usage {
                            usage = api_usage.into();
                        }

                        if let Some(choice) = parsed.choices.first() {
                            if let Some(delta) = &choice.delta.content
                                && !delta.is_empty()
                            {
                                content.push_str(delta);
                                yield OpenAiStreamChunk::TextDelta(delta.clone());
                            }

                            if choice.finish_reason.is_some() {
                                finish_reason = parse_finish_reason(choice.finish_reason.as_deref());
                            }
                        }
                    }

                    if finished {
                        break;
                    }
                }

                if !finished {
                    Err::<(), _>(ProviderError::transport("OpenAI stream ended before [DONE]"))?;
                }

                yield OpenAiStreamChunk::MessageComplete(content.clone());
                yield OpenAiStreamChunk::ResponseComplete(OpenAiResponse {
                    model: model.unwrap_or(model_for_fallback),
                    content,
                    finish_reason,
                    usage,
                });
            };

            Ok(Box::pin(stream) as OpenAiChunkStream<'a>)
        })
    }
}
