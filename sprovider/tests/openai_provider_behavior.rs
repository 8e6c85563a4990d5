#![cfg(feature = "provider-openai")]

use std::sync::{Arc, Mutex};

use futures_util::{StreamExt, stream};
use sprovider::adapters::openai::{
    OpenAiChunkStream, OpenAiFinishReason, OpenAiProvider, OpenAiRequest, OpenAiResponse,
    OpenAiRole, OpenAiStreamChunk, OpenAiTransport, OpenAiUsage,
};
use sprovider::{
    KeyRotator, Message, ModelProvider, ProviderError, ProviderErrorKind, ProviderFuture,
    ProviderId, RawResponse, SecretString, StopReason, StreamEvent, StreamNormalizer,
};

#[derive(Debug, Default)]
struct FakeTransport {
    captured_key: Mutex<Option<String>>,
    captured_request: Mutex<Option<OpenAiRequest>>,
    fail_with: Option<ProviderError>,
}

impl FakeTransport {
    fn failing(error: ProviderError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    fn capture(&self, request: OpenAiRequest, api_key: &SecretString) -> Result<(), ProviderError> {
        *self.captured_request.lock().expect("request lock") = Some(request);
        *self.captured_key.lock().expect("key lock") = Some(api_key.expose().to_string());
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl OpenAiTransport for FakeTransport {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
        Box::pin(async move {
            self.capture(request, &api_key)?;
            Ok(OpenAiResponse {
                model: "gpt-3.5-turbo-0125".to_string(),
                content: "I hear you.".to_string(),
                finish_reason: OpenAiFinishReason::Stop,
                usage: OpenAiUsage {
                    prompt_tokens: 7,
                    completion_tokens: 3,
                    total_tokens: 10,
                },
            })
        })
    }

    fn stream<'a>(
        &'a self,
        request: OpenAiRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.capture(request, &api_key)?;
            let chunks = stream::iter(vec![
                Ok(OpenAiStreamChunk::TextDelta("I hear".to_string())),
                Ok(OpenAiStreamChunk::TextDelta(" you.".to_string())),
                Ok(OpenAiStreamChunk::MessageComplete("I hear you.".to_string())),
            ]);
            Ok(Box::pin(chunks) as OpenAiChunkStream<'a>)
        })
    }
}

fn pool() -> KeyRotator {
    KeyRotator::for_provider(ProviderId::OpenAi, ["sk-live-1", "sk-live-2"]).expect("valid keys")
}

fn conversation() -> Vec<Message> {
    vec![Message::system("Be kind."), Message::user("hello")]
}

#[tokio::test]
async fn streaming_invoke_passes_deltas_through_in_order() {
    let transport = Arc::new(FakeTransport::default());
    let provider = OpenAiProvider::new(transport.clone());
    assert!(provider.capabilities().native_streaming);

    let rotator = pool();
    let credential = rotator.next().expect("credential");
    let request = provider
        .build_request(&conversation(), &credential)
        .expect("request builds");

    let RawResponse::Stream(mut events) = provider.invoke(request).await.expect("invoke") else {
        panic!("streaming provider must return a stream");
    };

    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        collected.push(event.expect("event"));
    }
    assert_eq!(
        collected,
        vec![
            StreamEvent::TextDelta("I hear".to_string()),
            StreamEvent::TextDelta(" you.".to_string()),
            StreamEvent::MessageComplete(Message::assistant("I hear you.")),
        ]
    );

    let captured = transport
        .captured_request
        .lock()
        .expect("request lock")
        .clone()
        .expect("request captured");
    assert!(captured.stream);
    assert_eq!(captured.model, "gpt-3.5-turbo");
    assert_eq!(captured.messages[0].role, OpenAiRole::System);
    assert_eq!(
        transport.captured_key.lock().expect("key lock").as_deref(),
        Some("sk-live-1")
    );
}

#[tokio::test]
async fn complete_mode_returns_whole_response() {
    let transport = Arc::new(FakeTransport::default());
    let provider = OpenAiProvider::new(transport.clone())
        .with_model("gpt-4o-mini")
        .with_native_streaming(false);
    assert!(!provider.capabilities().native_streaming);

    let rotator = pool();
    let _first = rotator.next().expect("credential");
    let second = rotator.next().expect("credential");
    let request = provider
        .build_request(&conversation(), &second)
        .expect("request builds");

    let RawResponse::Complete(response) = provider.invoke(request).await.expect("invoke") else {
        panic!("complete mode must return a response");
    };
    assert_eq!(response.provider, ProviderId::OpenAi);
    assert_eq!(response.content, "I hear you.");
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(response.usage.total_tokens, 10);
    assert_eq!(
        transport.captured_key.lock().expect("key lock").as_deref(),
        Some("sk-live-2")
    );
}

#[tokio::test]
async fn both_modes_normalize_to_the_same_text() {
    let normalizer = StreamNormalizer::new();
    let rotator = pool();
    let credential = rotator.next().expect("credential");
    let mut texts = Vec::new();

    for native in [true, false] {
        let provider =
            OpenAiProvider::new(Arc::new(FakeTransport::default())).with_native_streaming(native);
        let request = provider
            .build_request(&conversation(), &credential)
            .expect("request builds");
        let raw = provider.invoke(request).await.expect("invoke");
        let text = normalizer
            .normalize(raw)
            .map(|fragment| fragment.expect("fragment").text)
            .collect::<Vec<_>>()
            .await
            .concat();
        texts.push(text);
    }

    assert_eq!(texts, vec!["I hear you.", "I hear you."]);
}

#[tokio::test]
async fn transport_errors_surface_from_invoke() {
    let provider = OpenAiProvider::new(Arc::new(FakeTransport::failing(
        ProviderError::authentication("Incorrect API key provided"),
    )));
    let rotator = pool();
    let credential = rotator.next().expect("credential");
    let request = provider
        .build_request(&conversation(), &credential)
        .expect("request builds");

    let error = provider.invoke(request).await.expect_err("auth failure");
    assert_eq!(error.kind, ProviderErrorKind::Authentication);
    assert!(!error.to_string().contains("sk-live-1"));
}
