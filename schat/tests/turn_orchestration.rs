use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{StreamExt, stream};
use schat::prelude::*;
use sprovider::{
    Credential, KeyRotator, Message, ModelProvider, ModelResponse, ProviderCapabilities,
    ProviderError, ProviderFuture, ProviderId, ProviderRegistry, ProviderRequest, RawResponse,
    RetryPolicy, Role, SecretString, StopReason, StreamEvent, TokenUsage, VecEventStream,
};
use tokio::sync::Barrier;

#[derive(Clone)]
enum Reply {
    Complete(&'static str),
    Stream(Vec<Result<StreamEvent, ProviderError>>),
    /// First delta immediately, each following one after `Duration`.
    Trickle(Vec<&'static str>, Duration),
    Fail(ProviderError),
    FailThen(usize, ProviderError, &'static str),
    /// Succeeds once, then fails with the error on every later call.
    Revoked(&'static str, ProviderError),
    Rendezvous(Arc<Barrier>, &'static str),
    Hang,
}

#[derive(Debug, Clone)]
struct Call {
    slot: usize,
    messages: Vec<Message>,
}

struct ScriptedProvider {
    id: ProviderId,
    streaming: bool,
    replies: HashMap<String, Reply>,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    fn new(id: ProviderId, streaming: bool) -> Self {
        Self {
            id,
            streaming,
            replies: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn reply(mut self, key: &str, reply: Reply) -> Self {
        self.replies.insert(key.to_string(), reply);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn complete(&self, model: String, text: &str) -> RawResponse<'_> {
        RawResponse::Complete(ModelResponse {
            provider: self.id,
            model,
            content: text.to_string(),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }
}

impl ModelProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        if self.streaming {
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
        Ok(ProviderRequest::new(
            self.id,
            "scripted",
            conversation.to_vec(),
            credential.clone(),
        ))
    }

    fn invoke<'a>(
        &'a self,
        request: ProviderRequest,
    ) -> ProviderFuture<'a, Result<RawResponse<'a>, ProviderError>> {
        Box::pin(async move {
            let key = request.credential.secret().expose().to_string();
            self.calls.lock().expect("calls lock").push(Call {
                slot: request.credential.slot(),
                messages: request.messages.clone(),
            });

            let reply = self
                .replies
                .get(&key)
                .cloned()
                .unwrap_or(Reply::Fail(ProviderError::authentication("unscripted key")));

            match reply {
                Reply::Complete(text) => Ok(self.complete(request.model, text)),
                Reply::Stream(events) => Ok(RawResponse::Stream(Box::pin(VecEventStream::new(
                    events,
                )))),
                Reply::Trickle(deltas, pause) => {
                    let events = stream::iter(deltas.into_iter().enumerate()).then(
                        move |(index, delta)| async move {
                            if index > 0 {
                                tokio::time::sleep(pause).await;
                            }
                            Ok(StreamEvent::TextDelta(delta.to_string()))
                        },
                    );
                    Ok(RawResponse::Stream(Box::pin(events)))
                }
                Reply::Fail(error) => Err(error),
                Reply::FailThen(count, error, text) => {
                    let mut failures = self.failures.lock().expect("failures lock");
                    let seen = failures.entry(key).or_default();
                    if *seen < count {
                        *seen += 1;
                        return Err(error);
                    }
                    drop(failures);
                    Ok(self.complete(request.model, text))
                }
                Reply::Revoked(text, error) => {
                    let mut uses = self.failures.lock().expect("failures lock");
                    let seen = uses.entry(key).or_default();
                    *seen += 1;
                    if *seen > 1 {
                        return Err(error);
                    }
                    drop(uses);
                    Ok(self.complete(request.model, text))
                }
                Reply::Rendezvous(barrier, text) => {
                    barrier.wait().await;
                    Ok(self.complete(request.model, text))
                }
                Reply::Hang => std::future::pending().await,
            }
        })
    }
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn record(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl ChatTurnHooks for RecordingHooks {
    fn on_turn_start(&self, user_id: &UserId, provider: ProviderId) {
        self.record(format!("start:{user_id}:{provider}"));
    }

    fn on_phase_change(&self, _user_id: &UserId, _provider: ProviderId, from: TurnPhase, to: TurnPhase) {
        self.record(format!("phase:{}->{}", from.as_str(), to.as_str()));
    }

    fn on_turn_complete(&self, _user_id: &UserId, result: &ChatTurnResult) {
        self.record(format!("complete:{}", result.assistant_message));
    }

    fn on_turn_failed(&self, _user_id: &UserId, _provider: Option<ProviderId>, error: &ChatError) {
        self.record(format!("failed:{:?}", error.kind));
    }

    fn on_turn_cancelled(&self, _user_id: &UserId, _provider: ProviderId, phase: TurnPhase) {
        self.record(format!("cancelled:{}", phase.as_str()));
    }
}

struct Harness {
    orchestrator: ChatOrchestrator,
    provider: Arc<ScriptedProvider>,
    credentials: Arc<KeyRotator>,
    store: Arc<ConversationStore>,
    hooks: Arc<RecordingHooks>,
}

fn harness(provider: ScriptedProvider, keys: &[&str]) -> Harness {
    harness_with_policy(provider, keys, ChatPolicy::default())
}

fn harness_with_policy(provider: ScriptedProvider, keys: &[&str], policy: ChatPolicy) -> Harness {
    let provider = Arc::new(provider);
    let credentials = Arc::new(KeyRotator::new(
        keys.iter().map(|key| SecretString::new(*key)).collect(),
    ));
    let mut registry = ProviderRegistry::new();
    registry.register_shared(provider.clone(), Arc::clone(&credentials));

    let store = Arc::new(ConversationStore::new("You are helpful.", 10));
    let hooks = Arc::new(RecordingHooks::default());
    let orchestrator = ChatOrchestrator::builder(Arc::new(registry), Arc::clone(&store))
        .policy(
            policy
                .with_default_provider(provider.id)
                .with_retry(RetryPolicy::fixed(Duration::from_millis(1))),
        )
        .hooks(hooks.clone())
        .build();

    Harness {
        orchestrator,
        provider,
        credentials,
        store,
        hooks,
    }
}

async fn collect(stream: ChatTurnStream) -> (Vec<String>, Result<ChatTurnResult, ChatError>) {
    let events: Vec<_> = stream.collect().await;
    let mut fragments = Vec::new();
    for event in events {
        match event {
            Ok(ChatEvent::Fragment(text)) => fragments.push(text),
            Ok(ChatEvent::TurnComplete(result)) => return (fragments, Ok(result)),
            Err(error) => return (fragments, Err(error)),
        }
    }

    (
        fragments,
        Err(ChatError::cancelled("stream ended without a terminal item")),
    )
}

fn request(user: &str, message: &str) -> ChatTurnRequest {
    ChatTurnRequest::new(UserId::from(user), message)
}

#[tokio::test]
async fn complete_reply_is_split_into_fragments_and_committed() {
    let h = harness(
        ScriptedProvider::new(ProviderId::Claude, false).reply("sk-ant-a", Reply::Complete("Hi there")),
        &["sk-ant-a"],
    );

    let stream = h
        .orchestrator
        .stream_turn(request("ada", "hello"))
        .await
        .expect("turn starts");
    assert_eq!(stream.provider(), ProviderId::Claude);

    let (fragments, result) = collect(stream).await;
    let result = result.expect("turn completes");
    assert_eq!(fragments.len(), "Hi there".chars().count());
    assert_eq!(fragments.concat(), "Hi there");
    assert_eq!(result.assistant_message, "Hi there");
    assert_eq!(result.fragments, fragments.len());
    assert_eq!(result.attempts, 1);

    let calls = h.provider.calls();
    assert_eq!(
        calls[0].messages,
        vec![Message::system("You are helpful."), Message::user("hello")]
    );

    let messages = h.store.snapshot(&UserId::from("ada")).await.expect("snapshot");
    assert_eq!(
        messages,
        vec![
            Message::system("You are helpful."),
            Message::user("hello"),
            Message::assistant("Hi there"),
        ]
    );
    assert_eq!(
        h.hooks.events(),
        vec![
            "start:ada:claude",
            "phase:idle->awaiting_provider",
            "phase:awaiting_provider->streaming",
            "phase:streaming->completed",
            "complete:Hi there",
        ]
    );
}

#[tokio::test]
async fn native_stream_deltas_pass_through_in_order() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, true).reply(
            "sk-a",
            Reply::Stream(vec![
                Ok(StreamEvent::TextDelta("Hel".to_string())),
                Ok(StreamEvent::TextDelta("lo".to_string())),
                Ok(StreamEvent::MessageComplete(Message::new(Role::Assistant, "Hello"))),
            ]),
        ),
        &["sk-a"],
    );

    let result = h.orchestrator.run_turn(request("ada", "hi")).await.expect("turn");
    assert_eq!(result.assistant_message, "Hello");
    assert_eq!(result.fragments, 2);
}

#[tokio::test]
async fn provider_sees_history_of_earlier_turns() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false).reply("sk-a", Reply::Complete("ok")),
        &["sk-a"],
    );

    h.orchestrator.run_turn(request("ada", "one")).await.expect("first");
    h.orchestrator.run_turn(request("ada", "two")).await.expect("second");

    let calls = h.provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].messages,
        vec![
            Message::system("You are helpful."),
            Message::user("one"),
            Message::assistant("ok"),
            Message::user("two"),
        ]
    );
}

#[tokio::test]
async fn failing_credential_rotates_to_next_slot() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply("sk-a", Reply::Fail(ProviderError::rate_limited("quota exceeded")))
            .reply("sk-b", Reply::Complete("recovered")),
        &["sk-a", "sk-b"],
    );

    let result = h.orchestrator.run_turn(request("ada", "hi")).await.expect("turn");
    assert_eq!(result.assistant_message, "recovered");
    assert_eq!(result.credential_slot, 1);
    assert_eq!(result.attempts, 2);
    assert!(h.credentials.is_failed(0).expect("status"));
    assert!(!h.credentials.is_failed(1).expect("status"));

    let slots: Vec<_> = h.provider.calls().iter().map(|call| call.slot).collect();
    assert_eq!(slots, vec![0, 1]);
}

#[tokio::test]
async fn exhausting_every_credential_fails_before_streaming() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply("sk-a", Reply::Fail(ProviderError::authentication("bad key")))
            .reply("sk-b", Reply::Fail(ProviderError::unavailable("overloaded"))),
        &["sk-a", "sk-b"],
    );

    let error = h
        .orchestrator
        .stream_turn(request("ada", "hi"))
        .await
        .expect_err("pool exhausted");
    assert_eq!(error.kind, ChatErrorKind::Exhausted);
    assert_eq!(error.details.as_deref(), Some("overloaded"));
    assert_eq!(h.provider.calls().len(), 2);
    assert_eq!(h.credentials.failed_count().expect("count"), 2);

    let messages = h.store.snapshot(&UserId::from("ada")).await.expect("snapshot");
    assert_eq!(messages.last(), Some(&Message::user("hi")));
    assert_eq!(messages.len(), 2);
    assert!(h.hooks.events().contains(&"failed:Exhausted".to_string()));
}

#[tokio::test]
async fn exhaustion_keeps_earlier_turns_intact() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply(
                "sk-a",
                Reply::Revoked("welcome back", ProviderError::authentication("key revoked")),
            )
            .reply("sk-b", Reply::Fail(ProviderError::unavailable("overloaded"))),
        &["sk-a", "sk-b"],
    );

    let first = h
        .orchestrator
        .run_turn(request("ada", "hello"))
        .await
        .expect("first turn completes");
    assert_eq!(first.assistant_message, "welcome back");

    let error = h
        .orchestrator
        .run_turn(request("ada", "still there?"))
        .await
        .expect_err("pool exhausted");
    assert_eq!(error.kind, ChatErrorKind::Exhausted);
    assert_eq!(h.provider.calls().len(), 3);
    assert_eq!(h.credentials.failed_count().expect("count"), 2);

    let messages = h.store.snapshot(&UserId::from("ada")).await.expect("snapshot");
    assert_eq!(
        messages,
        vec![
            Message::system("You are helpful."),
            Message::user("hello"),
            Message::assistant("welcome back"),
            Message::user("still there?"),
        ]
    );
}

#[tokio::test]
async fn response_contradicting_capabilities_fails_without_rotating() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply(
                "sk-a",
                Reply::Stream(vec![Ok(StreamEvent::TextDelta("surprise".to_string()))]),
            )
            .reply("sk-b", Reply::Complete("unused")),
        &["sk-a", "sk-b"],
    );

    let error = h
        .orchestrator
        .run_turn(request("ada", "hi"))
        .await
        .expect_err("shape mismatch");
    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert_eq!(h.provider.calls().len(), 1);
    assert_eq!(h.credentials.failed_count().expect("count"), 0);
}

#[tokio::test]
async fn exhausted_pool_resets_on_the_next_turn() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply(
                "sk-a",
                Reply::FailThen(1, ProviderError::rate_limited("slow down"), "first key back"),
            )
            .reply(
                "sk-b",
                Reply::FailThen(1, ProviderError::rate_limited("slow down"), "second key back"),
            ),
        &["sk-a", "sk-b"],
    );

    let error = h
        .orchestrator
        .run_turn(request("ada", "hi"))
        .await
        .expect_err("first turn exhausts the pool");
    assert_eq!(error.kind, ChatErrorKind::Exhausted);

    let result = h
        .orchestrator
        .run_turn(request("ada", "again"))
        .await
        .expect("pool reset lets the turn through");
    assert_eq!(result.credential_slot, 0);
    assert_eq!(result.assistant_message, "first key back");
    assert_eq!(h.credentials.failed_count().expect("count"), 0);
}

#[tokio::test]
async fn empty_pool_is_exhausted_without_calling_the_provider() {
    let h = harness(ScriptedProvider::new(ProviderId::OpenAi, false), &[]);

    let error = h
        .orchestrator
        .run_turn(request("ada", "hi"))
        .await
        .expect_err("no credentials");
    assert_eq!(error.kind, ChatErrorKind::Exhausted);
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn invalid_request_does_not_rotate_credentials() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply("sk-a", Reply::Fail(ProviderError::invalid_request("context too long")))
            .reply("sk-b", Reply::Complete("unused")),
        &["sk-a", "sk-b"],
    );

    let error = h
        .orchestrator
        .run_turn(request("ada", "hi"))
        .await
        .expect_err("rejected request");
    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert_eq!(h.provider.calls().len(), 1);
    assert_eq!(h.credentials.failed_count().expect("count"), 0);
}

#[tokio::test]
async fn unknown_or_unconfigured_provider_is_a_client_error() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false).reply("sk-a", Reply::Complete("ok")),
        &["sk-a"],
    );

    for name in ["gemini", "claude"] {
        let error = h
            .orchestrator
            .stream_turn(request("ada", "hi").with_provider(name))
            .await
            .expect_err("unresolvable provider");
        assert_eq!(error.kind, ChatErrorKind::UnknownProvider);
        assert_eq!(error.message, "Unknown service");
        assert!(error.is_client_error());
    }

    assert!(h.store.is_empty().expect("is_empty"));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn mid_stream_failure_marks_credential_and_commits_nothing() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, true).reply(
            "sk-a",
            Reply::Stream(vec![
                Ok(StreamEvent::TextDelta("par".to_string())),
                Err(ProviderError::transport("connection reset")),
            ]),
        ),
        &["sk-a", "sk-b"],
    );

    let stream = h
        .orchestrator
        .stream_turn(request("ada", "hi"))
        .await
        .expect("turn starts");
    let (fragments, result) = collect(stream).await;
    assert_eq!(fragments, vec!["par"]);

    let error = result.expect_err("stream fails");
    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert_eq!(error.message, "provider stream failed");
    assert!(h.credentials.is_failed(0).expect("status"));
    assert_eq!(h.provider.calls().len(), 1);

    let messages = h.store.snapshot(&UserId::from("ada")).await.expect("snapshot");
    assert_eq!(messages.last(), Some(&Message::user("hi")));
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_turn() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, true).reply(
            "sk-a",
            Reply::Trickle(vec!["a", "b", "c"], Duration::from_millis(50)),
        ),
        &["sk-a"],
    );

    let mut stream = h
        .orchestrator
        .stream_turn(request("ada", "hi"))
        .await
        .expect("turn starts");
    let first = stream.next().await.expect("first item").expect("fragment");
    assert_eq!(first, ChatEvent::Fragment("a".to_string()));
    drop(stream);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let messages = h.store.snapshot(&UserId::from("ada")).await.expect("snapshot");
    assert_eq!(messages.last(), Some(&Message::user("hi")));
    assert!(h.hooks.events().contains(&"cancelled:streaming".to_string()));
    assert!(!h.credentials.is_failed(0).expect("status"));
}

#[tokio::test]
async fn abandoning_a_pending_turn_releases_the_conversation() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false).reply("sk-a", Reply::Hang),
        &["sk-a"],
    );

    let pending = tokio::time::timeout(
        Duration::from_millis(50),
        h.orchestrator.stream_turn(request("ada", "hi")),
    )
    .await;
    assert!(pending.is_err(), "hung provider never answers");

    let user = UserId::from("ada");
    let lease = tokio::time::timeout(Duration::from_millis(200), h.store.lock(&user))
        .await
        .expect("lease is released after the caller gives up")
        .expect("lease");
    assert_eq!(lease.snapshot().last(), Some(&Message::user("hi")));
    drop(lease);

    assert_eq!(
        h.hooks.events(),
        vec![
            "start:ada:openai",
            "phase:idle->awaiting_provider",
            "cancelled:awaiting_provider",
        ]
    );
    assert!(!h.credentials.is_failed(0).expect("status"));
}

#[tokio::test]
async fn hung_provider_times_out_at_the_turn_deadline() {
    let h = harness_with_policy(
        ScriptedProvider::new(ProviderId::OpenAi, false).reply("sk-a", Reply::Hang),
        &["sk-a"],
        ChatPolicy::default().with_turn_deadline(Duration::from_millis(50)),
    );

    let error = h
        .orchestrator
        .stream_turn(request("ada", "hi"))
        .await
        .expect_err("deadline");
    assert_eq!(error.kind, ChatErrorKind::Timeout);
}

#[tokio::test]
async fn stalled_stream_times_out_without_committing() {
    let h = harness_with_policy(
        ScriptedProvider::new(ProviderId::OpenAi, true).reply(
            "sk-a",
            Reply::Trickle(vec!["fast", "never"], Duration::from_secs(5)),
        ),
        &["sk-a"],
        ChatPolicy::default().with_turn_deadline(Duration::from_millis(100)),
    );

    let stream = h
        .orchestrator
        .stream_turn(request("ada", "hi"))
        .await
        .expect("turn starts");
    let (fragments, result) = collect(stream).await;
    assert_eq!(fragments, vec!["fast"]);
    assert_eq!(result.expect_err("deadline").kind, ChatErrorKind::Timeout);

    let messages = h.store.snapshot(&UserId::from("ada")).await.expect("snapshot");
    assert_eq!(messages.last(), Some(&Message::user("hi")));
}

#[tokio::test]
async fn turns_for_one_user_are_serialized() {
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, true).reply(
            "sk-a",
            Reply::Trickle(vec!["slow ", "reply"], Duration::from_millis(30)),
        ),
        &["sk-a"],
    );

    let first = h.orchestrator.clone();
    let second = h.orchestrator.clone();
    let (a, b) = tokio::join!(
        first.run_turn(request("ada", "one")),
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            second.run_turn(request("ada", "two")).await
        }
    );
    a.expect("first turn");
    b.expect("second turn");

    let calls = h.provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].messages[1..],
        [
            Message::user("one"),
            Message::assistant("slow reply"),
            Message::user("two"),
        ]
    );
}

#[tokio::test]
async fn turns_for_different_users_run_in_parallel() {
    let barrier = Arc::new(Barrier::new(2));
    let h = harness(
        ScriptedProvider::new(ProviderId::OpenAi, false)
            .reply("sk-a", Reply::Rendezvous(barrier, "met")),
        &["sk-a"],
    );

    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        tokio::join!(
            h.orchestrator.run_turn(request("ada", "hi")),
            h.orchestrator.run_turn(request("grace", "hi")),
        )
    })
    .await
    .expect("both turns reach the provider concurrently");

    assert_eq!(outcome.0.expect("ada").assistant_message, "met");
    assert_eq!(outcome.1.expect("grace").assistant_message, "met");
}
