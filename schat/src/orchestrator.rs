//! Turn orchestration: validation, provider resolution, credential rotation,
//! and incremental delivery.
//!
//! A turn runs in its own task. It holds the user's conversation lease from
//! the moment the user message is appended until the assistant reply is
//! committed or the turn ends, so turns for one user are strictly serialized.
//! Fragments reach the caller through a bounded channel; a slow reader slows
//! the producer down and a dropped reader cancels the turn.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use scommon::UserId;
use sprovider::{
    NoopOperationHooks, ProviderEntry, ProviderId, ProviderOperationHooks, ProviderRegistry,
    RawResponse, RetryPolicy, Rotated, StreamNormalizer, execute_with_rotation,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};

use crate::{
    ChatError, ChatEvent, ChatTurnHooks, ChatTurnRequest, ChatTurnResult, ChatTurnStream,
    ConversationLease, ConversationStore, NoopChatTurnHooks, TurnPhase,
};

pub const DEFAULT_TURN_DEADLINE: Duration = Duration::from_secs(120);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatPolicy {
    /// Provider used when a request names none.
    pub default_provider: ProviderId,
    pub retry: RetryPolicy,
    /// Upper bound on a whole turn, from lease acquisition to the last fragment.
    pub turn_deadline: Duration,
    pub channel_capacity: usize,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            default_provider: ProviderId::OpenAi,
            retry: RetryPolicy::default(),
            turn_deadline: DEFAULT_TURN_DEADLINE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ChatPolicy {
    pub fn with_default_provider(mut self, provider: ProviderId) -> Self {
        self.default_provider = provider;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_turn_deadline(mut self, turn_deadline: Duration) -> Self {
        self.turn_deadline = turn_deadline;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity.max(1);
        self
    }
}

#[derive(Clone)]
pub struct ChatOrchestrator {
    registry: Arc<ProviderRegistry>,
    store: Arc<ConversationStore>,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatTurnHooks>,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    normalizer: StreamNormalizer,
}

impl ChatOrchestrator {
    pub fn builder(
        registry: Arc<ProviderRegistry>,
        store: Arc<ConversationStore>,
    ) -> ChatOrchestratorBuilder {
        ChatOrchestratorBuilder {
            registry,
            store,
            policy: ChatPolicy::default(),
            hooks: Arc::new(NoopChatTurnHooks),
            provider_hooks: Arc::new(NoopOperationHooks),
            normalizer: StreamNormalizer::default(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn policy(&self) -> &ChatPolicy {
        &self.policy
    }

    /// Starts a turn and resolves once a provider has accepted it.
    ///
    /// Validation, provider resolution, and credential exhaustion are
    /// reported here, before any fragment exists. Dropping the returned
    /// future abandons the turn; the user message stays recorded if it was
    /// already appended.
    pub async fn stream_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnStream, ChatError> {
        let ChatTurnRequest {
            user_id,
            message,
            provider,
        } = request;

        if message.trim().is_empty() {
            let error = ChatError::validation("Message is required");
            self.hooks.on_turn_failed(&user_id, None, &error);
            return Err(error);
        }

        let name = provider
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.policy.default_provider.as_str());

        let (provider_id, entry) = match self.registry.resolve(name) {
            Ok(resolved) => resolved,
            Err(error) => {
                let error = ChatError::from(error);
                self.hooks.on_turn_failed(&user_id, None, &error);
                return Err(error);
            }
        };

        self.hooks.on_turn_start(&user_id, provider_id);

        let (ready_tx, ready_rx) = oneshot::channel();
        let (events_tx, events_rx) = mpsc::channel(self.policy.channel_capacity.max(1));
        let turn = Turn {
            store: Arc::clone(&self.store),
            hooks: Arc::clone(&self.hooks),
            provider_hooks: Arc::clone(&self.provider_hooks),
            retry: self.policy.retry.clone(),
            normalizer: self.normalizer,
            user_id,
            provider_id,
            entry,
            message,
            budget: self.policy.turn_deadline,
            deadline: Instant::now() + self.policy.turn_deadline,
        };
        tokio::spawn(turn.run(ready_tx, events_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(ChatTurnStream::new(provider_id, events_rx)),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(ChatError::cancelled(
                "turn ended before the provider responded",
            )),
        }
    }

    /// Runs a turn to completion and returns the committed reply.
    pub async fn run_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnResult, ChatError> {
        let mut stream = self.stream_turn(request).await?;
        while let Some(event) = stream.next().await {
            if let ChatEvent::TurnComplete(result) = event? {
                return Ok(result);
            }
        }

        Err(ChatError::cancelled("turn ended without completing"))
    }
}

pub struct ChatOrchestratorBuilder {
    registry: Arc<ProviderRegistry>,
    store: Arc<ConversationStore>,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatTurnHooks>,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    normalizer: StreamNormalizer,
}

impl ChatOrchestratorBuilder {
    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatTurnHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn provider_hooks(mut self, provider_hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.provider_hooks = provider_hooks;
        self
    }

    pub fn normalizer(mut self, normalizer: StreamNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn build(self) -> ChatOrchestrator {
        ChatOrchestrator {
            registry: self.registry,
            store: self.store,
            policy: self.policy,
            hooks: self.hooks,
            provider_hooks: self.provider_hooks,
            normalizer: self.normalizer,
        }
    }
}

type EventSender = mpsc::Sender<Result<ChatEvent, ChatError>>;

enum Delivery {
    Sent,
    Closed,
    Expired,
}

struct Turn {
    store: Arc<ConversationStore>,
    hooks: Arc<dyn ChatTurnHooks>,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    retry: RetryPolicy,
    normalizer: StreamNormalizer,
    user_id: UserId,
    provider_id: ProviderId,
    entry: ProviderEntry,
    message: String,
    budget: Duration,
    deadline: Instant,
}

impl Turn {
    async fn run(self, mut ready: oneshot::Sender<Result<(), ChatError>>, events: EventSender) {
        let opened = tokio::select! {
            opened = timeout_at(self.deadline, self.open()) => opened,
            _ = ready.closed() => {
                self.cancelled(TurnPhase::AwaitingProvider);
                return;
            }
        };

        let (lease, rotated) = match opened {
            Ok(Ok(opened)) => opened,
            Ok(Err(error)) => {
                self.failed(TurnPhase::AwaitingProvider, &error);
                let _ = ready.send(Err(error));
                return;
            }
            Err(_) => {
                let error = self.deadline_error();
                self.failed(TurnPhase::AwaitingProvider, &error);
                let _ = ready.send(Err(error));
                return;
            }
        };

        self.transition(TurnPhase::AwaitingProvider, TurnPhase::Streaming);
        if ready.send(Ok(())).is_err() {
            self.cancelled(TurnPhase::Streaming);
            return;
        }

        self.stream(lease, rotated, events).await;
    }

    /// Appends the user message under the lease and obtains a provider
    /// response, rotating credentials as needed.
    async fn open(&self) -> Result<(ConversationLease, Rotated<RawResponse<'_>>), ChatError> {
        let mut lease = self.store.lock(&self.user_id).await?;
        lease.append_user(self.message.as_str());
        self.transition(TurnPhase::Idle, TurnPhase::AwaitingProvider);

        let snapshot = lease.snapshot();
        let conversation = snapshot.as_slice();
        let provider = self.entry.provider.as_ref();

        let rotated = execute_with_rotation(
            self.provider_id,
            &self.entry.credentials,
            &self.retry,
            self.provider_hooks.as_ref(),
            move |credential, _attempt| async move {
                let request = provider.build_request(conversation, &credential)?;
                provider
                    .invoke(request)
                    .await?
                    .conforming_to(provider.id(), provider.capabilities())
            },
            futures_timer::Delay::new,
        )
        .await?;

        Ok((lease, rotated))
    }

    async fn stream(
        &self,
        mut lease: ConversationLease,
        rotated: Rotated<RawResponse<'_>>,
        events: EventSender,
    ) {
        let Rotated {
            value: raw,
            credential,
            attempts,
        } = rotated;
        let mut fragments = self.normalizer.normalize(raw);
        let mut text = String::new();
        let mut count = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = events.closed() => {
                    self.cancelled(TurnPhase::Streaming);
                    return;
                }
                next = timeout_at(self.deadline, fragments.next()) => next,
            };

            let fragment = match next {
                Ok(Some(Ok(fragment))) => fragment,
                Ok(None) => break,
                Ok(Some(Err(provider_error))) => {
                    if self.entry.credentials.mark_failed(&credential).is_ok() {
                        self.provider_hooks.on_credential_failed(
                            self.provider_id,
                            credential.slot(),
                            &provider_error,
                        );
                    }

                    let error = ChatError::provider("provider stream failed")
                        .with_details(provider_error.to_string());
                    self.failed(TurnPhase::Streaming, &error);
                    let _ = self.deliver(&events, Err(error)).await;
                    return;
                }
                Err(_) => {
                    self.expire(&events);
                    return;
                }
            };

            text.push_str(&fragment.text);
            count += 1;

            match self.deliver(&events, Ok(ChatEvent::Fragment(fragment.text))).await {
                Delivery::Sent => {}
                Delivery::Closed => {
                    self.cancelled(TurnPhase::Streaming);
                    return;
                }
                Delivery::Expired => {
                    self.expire(&events);
                    return;
                }
            }
        }

        if events.is_closed() {
            self.cancelled(TurnPhase::Streaming);
            return;
        }

        if !text.is_empty() {
            lease.append_assistant(text.as_str());
        }
        drop(lease);

        let result = ChatTurnResult {
            user_id: self.user_id.clone(),
            provider: self.provider_id,
            assistant_message: text,
            fragments: count,
            credential_slot: credential.slot(),
            attempts,
        };

        self.transition(TurnPhase::Streaming, TurnPhase::Completed);
        self.hooks.on_turn_complete(&self.user_id, &result);
        let _ = events.send(Ok(ChatEvent::TurnComplete(result))).await;
    }

    async fn deliver(
        &self,
        events: &EventSender,
        item: Result<ChatEvent, ChatError>,
    ) -> Delivery {
        match timeout_at(self.deadline, events.send(item)).await {
            Ok(Ok(())) => Delivery::Sent,
            Ok(Err(_)) => Delivery::Closed,
            Err(_) => Delivery::Expired,
        }
    }

    fn expire(&self, events: &EventSender) {
        let error = self.deadline_error();
        self.failed(TurnPhase::Streaming, &error);
        // The deadline has passed, so only a free slot can carry the error.
        let _ = events.try_send(Err(error));
    }

    fn deadline_error(&self) -> ChatError {
        ChatError::timeout(format!(
            "turn exceeded its {}s deadline",
            self.budget.as_secs_f64()
        ))
    }

    fn transition(&self, from: TurnPhase, to: TurnPhase) {
        self.hooks
            .on_phase_change(&self.user_id, self.provider_id, from, to);
    }

    fn failed(&self, from: TurnPhase, error: &ChatError) {
        self.transition(from, TurnPhase::Failed);
        self.hooks
            .on_turn_failed(&self.user_id, Some(self.provider_id), error);
    }

    fn cancelled(&self, phase: TurnPhase) {
        self.hooks
            .on_turn_cancelled(&self.user_id, self.provider_id, phase);
    }
}
