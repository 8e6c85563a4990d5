//! Streaming chat gateway over interchangeable LLM providers.
//!
//! This crate wires the workspace together: configuration, provider
//! construction, observability hooks, and the HTTP boundary. The building
//! blocks are re-exported so embedders can depend on `solace` alone.
//!
//! ```rust,no_run
//! use clap::Parser;
//! use solace::config::{Cli, GatewayConfig};
//!
//! # async fn serve() -> anyhow::Result<()> {
//! let config = GatewayConfig::resolve(Cli::parse(), |name| std::env::var(name).ok())?;
//! let orchestrator = solace::build_orchestrator(&config)?;
//! let listener = tokio::net::TcpListener::bind(config.bind).await?;
//! axum::serve(listener, solace::router(orchestrator)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod prelude;
pub mod runtime;
pub mod server;

pub use schat;
pub use scommon;
pub use sobserve;
pub use sprovider;

pub use config::{Cli, ConfigError, ConfigErrorKind, GatewayConfig};
pub use runtime::{build_orchestrator, build_registry, chat_policy, orchestrator_with};
pub use schat::{
    ChatError, ChatErrorKind, ChatEvent, ChatOrchestrator, ChatPolicy, ChatTurnRequest,
    ChatTurnResult, ChatTurnStream, ConversationStore,
};
pub use scommon::UserId;
pub use server::{AppState, router};
pub use sprovider::{
    KeyRotator, Message, ModelProvider, ProviderError, ProviderErrorKind, ProviderId,
    ProviderRegistry, RetryPolicy, Role,
};
