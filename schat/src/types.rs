//! Turn request, event, and result types.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use scommon::UserId;
use sprovider::ProviderId;
use tokio::sync::mpsc;

use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnRequest {
    pub user_id: UserId,
    pub message: String,
    /// Provider name as supplied by the caller; `None` selects the default.
    pub provider: Option<String>,
}

impl ChatTurnRequest {
    pub fn new(user_id: UserId, message: impl Into<String>) -> Self {
        Self {
            user_id,
            message: message.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnResult {
    pub user_id: UserId,
    pub provider: ProviderId,
    pub assistant_message: String,
    pub fragments: usize,
    /// Pool slot of the credential that served the turn.
    pub credential_slot: usize,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Fragment(String),
    TurnComplete(ChatTurnResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    Idle,
    AwaitingProvider,
    Streaming,
    Completed,
    Failed,
}

impl TurnPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingProvider => "awaiting_provider",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Fragments of one turn in provider order, followed by exactly one
/// terminal item: `TurnComplete` or an error.
///
/// Dropping the stream cancels the turn; nothing is committed for the
/// assistant.
#[derive(Debug)]
pub struct ChatTurnStream {
    provider: ProviderId,
    events: mpsc::Receiver<Result<ChatEvent, ChatError>>,
}

impl ChatTurnStream {
    pub(crate) fn new(
        provider: ProviderId,
        events: mpsc::Receiver<Result<ChatEvent, ChatError>>,
    ) -> Self {
        Self { provider, events }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }
}

impl Stream for ChatTurnStream {
    type Item = Result<ChatEvent, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}
