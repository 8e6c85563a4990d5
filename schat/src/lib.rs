//! Conversation memory and streaming turn orchestration over model providers.

mod error;
mod hooks;
mod orchestrator;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatEvent, ChatOrchestrator, ChatOrchestratorBuilder,
        ChatPolicy, ChatTurnHooks, ChatTurnRequest, ChatTurnResult, ChatTurnStream,
        ConversationLease, ConversationStore, NoopChatTurnHooks, TurnPhase,
    };
    pub use scommon::UserId;
}

pub use error::{ChatError, ChatErrorKind};
pub use hooks::{ChatTurnHooks, NoopChatTurnHooks};
pub use orchestrator::{
    ChatOrchestrator, ChatOrchestratorBuilder, ChatPolicy, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_TURN_DEADLINE,
};
pub use store::{Conversation, ConversationLease, ConversationStore, MIN_WINDOW};
pub use types::{ChatEvent, ChatTurnRequest, ChatTurnResult, ChatTurnStream, TurnPhase};
pub use scommon::UserId;
