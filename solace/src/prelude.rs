//! Common imports for applications embedding the gateway.

pub use crate::{
    ChatError, ChatErrorKind, ChatEvent, ChatOrchestrator, ChatPolicy, ChatTurnRequest,
    ChatTurnResult, ChatTurnStream, ConversationStore, GatewayConfig, KeyRotator, Message,
    ModelProvider, ProviderError, ProviderId, ProviderRegistry, RetryPolicy, Role, UserId,
};
pub use crate::{build_orchestrator, build_registry, orchestrator_with, router};
