//! Focused unit tests for OpenAI adapter internals.

#![cfg(test)]

use std::sync::Arc;

use futures_util::stream;

use crate::{
    KeyRotator, Message, ModelProvider, ProviderError, ProviderErrorKind, ProviderFuture,
    SecretString,
};

use super::provider::OpenAiProvider;
use super::serde_api::{OpenAiApiResponse, build_api_request, parse_finish_reason, sse_data};
use super::transport::{OpenAiChunkStream, OpenAiTransport};
use super::types::{
    OpenAiFinishReason, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiRole,
};

#[derive(Debug)]
struct NoopTransport;

impl OpenAiTransport for NoopTransport {
    fn complete<'a>(
        &'a self,
        _request: OpenAiRequest,
        _api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
        Box::pin(async { Err(ProviderError::other("not used")) })
    }

    fn stream<'a>(
        &'a self,
        _request: OpenAiRequest,
        _api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>> {
        Box::pin(async {
            let output = stream::iter(vec![Err(ProviderError::other("not used"))]);
            Ok(Box::pin(output) as OpenAiChunkStream<'a>)
        })
    }
}

fn conversation() -> Vec<Message> {
    vec![
        Message::system("You are kind."),
        Message::user("I feel low today"),
    ]
}

#[test]
fn build_openai_request_keeps_system_prompt_inline() {
    let provider = OpenAiProvider::new(Arc::new(NoopTransport)).with_model("gpt-4o-mini");
    let credential = KeyRotator::new(vec![SecretString::new("sk-a")])
        .next()
        .expect("credential");

    let request = provider
        .build_request(&conversation(), &credential)
        .expect("request should build");
    assert!(request.system.is_none());

    let built = provider.build_openai_request(request);
    assert_eq!(built.model, "gpt-4o-mini");
    assert!(built.stream);
    assert_eq!(built.messages.len(), 2);
    assert_eq!(built.messages[0].role, OpenAiRole::System);
    assert_eq!(built.messages[0].content, "You are kind.");
    assert_eq!(built.messages[1].role, OpenAiRole::User);
}

#[test]
fn parse_finish_reason_maps_expected_values() {
    assert_eq!(parse_finish_reason(Some("stop")), OpenAiFinishReason::Stop);
    assert_eq!(
        parse_finish_reason(Some("length")),
        OpenAiFinishReason::Length
    );
    assert_eq!(
        parse_finish_reason(Some("unknown")),
        OpenAiFinishReason::Other
    );
    assert_eq!(parse_finish_reason(None), OpenAiFinishReason::Other);
}

#[test]
fn build_api_request_rejects_blank_user_content() {
    let request = OpenAiRequest {
        model: "gpt-3.5-turbo".to_string(),
        messages: vec![OpenAiMessage {
            role: OpenAiRole::User,
            content: "   ".to_string(),
        }],
        temperature: None,
        max_tokens: None,
        stream: true,
    };

    let err = build_api_request(request).expect_err("blank content must fail");
    assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
}

#[test]
fn api_request_serializes_without_unset_options() {
    let request = OpenAiRequest {
        model: "gpt-3.5-turbo".to_string(),
        messages: vec![OpenAiMessage {
            role: OpenAiRole::User,
            content: "hi".to_string(),
        }],
        temperature: None,
        max_tokens: Some(64),
        stream: true,
    };

    let api_request = build_api_request(request).expect("request should build");
    let json = serde_json::to_value(&api_request).expect("serializes");
    assert_eq!(
        json,
        serde_json::json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 64,
            "stream": true
        })
    );
}

#[test]
fn completion_payload_converts_to_response() {
    let parsed: OpenAiApiResponse = serde_json::from_str(
        r#"{
            "model": "gpt-3.5-turbo-0125",
            "choices": [{"message": {"role": "assistant", "content": "I'm here."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#,
    )
    .expect("payload parses");

    let response = OpenAiResponse::try_from(parsed).expect("response converts");
    assert_eq!(response.content, "I'm here.");
    assert_eq!(response.finish_reason, OpenAiFinishReason::Stop);
    assert_eq!(response.usage.total_tokens, 15);

    let empty: OpenAiApiResponse =
        serde_json::from_str(r#"{"model": "gpt", "choices": []}"#).expect("payload parses");
    let err = OpenAiResponse::try_from(empty).expect_err("no choices");
    assert_eq!(err.kind, ProviderErrorKind::Transport);
}

#[test]
fn sse_data_extracts_payloads_only() {
    assert_eq!(sse_data("data: {\"a\":1}\n"), Some("{\"a\":1}"));
    assert_eq!(sse_data("data:[DONE]\r\n"), Some("[DONE]"));
    assert_eq!(sse_data(": keep-alive\n"), None);
    assert_eq!(sse_data("\n"), None);
    assert_eq!(sse_data("event: ping\n"), None);
}
