//! Wiring from resolved configuration to a running orchestrator.

use std::sync::Arc;

use reqwest::Client;
use schat::{ChatOrchestrator, ChatPolicy, ConversationStore};
use sobserve::{
    FanoutProviderHooks, FanoutTurnHooks, MetricsObservabilityHooks, SafeProviderHooks,
    SafeTurnHooks, TracingObservabilityHooks,
};
use sprovider::{KeyRotator, ModelProvider, ProviderError, ProviderId, ProviderRegistry, RetryPolicy};

use crate::config::GatewayConfig;

/// Builds adapters for every provider that has keys. Keys with the wrong
/// prefix for their provider are rejected here, before the server binds.
pub fn build_registry(config: &GatewayConfig) -> Result<ProviderRegistry, ProviderError> {
    let http = Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))?;

    let mut registry = ProviderRegistry::new();
    for provider_id in config.configured_providers() {
        let keys = config.keys_for(provider_id).iter().map(String::as_str);
        let credentials = KeyRotator::for_provider(provider_id, keys)?;
        let provider = build_provider(provider_id, config, http.clone())?;
        registry.register_shared(provider, Arc::new(credentials));
    }

    Ok(registry)
}

pub fn build_provider(
    provider_id: ProviderId,
    config: &GatewayConfig,
    http: Client,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    match provider_id {
        ProviderId::OpenAi => build_openai_provider(config, http),
        ProviderId::Claude => build_claude_provider(config, http),
    }
}

#[cfg(feature = "provider-openai")]
fn build_openai_provider(
    config: &GatewayConfig,
    http: Client,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    use sprovider::adapters::openai::{OpenAiHttpTransport, OpenAiProvider};

    let transport = Arc::new(OpenAiHttpTransport::new(http));
    Ok(Arc::new(
        OpenAiProvider::new(transport).with_model(config.openai_model.as_str()),
    ))
}

#[cfg(not(feature = "provider-openai"))]
fn build_openai_provider(
    _config: &GatewayConfig,
    _http: Client,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::invalid_request(
        "provider-openai feature is not enabled on solace",
    ))
}

#[cfg(feature = "provider-claude")]
fn build_claude_provider(
    config: &GatewayConfig,
    http: Client,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    use sprovider::adapters::claude::{ClaudeHttpTransport, ClaudeProvider};

    let transport = Arc::new(ClaudeHttpTransport::new(http));
    Ok(Arc::new(
        ClaudeProvider::new(transport).with_model(config.claude_model.as_str()),
    ))
}

#[cfg(not(feature = "provider-claude"))]
fn build_claude_provider(
    _config: &GatewayConfig,
    _http: Client,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::invalid_request(
        "provider-claude feature is not enabled on solace",
    ))
}

pub fn chat_policy(config: &GatewayConfig) -> ChatPolicy {
    ChatPolicy::default()
        .with_default_provider(config.default_service)
        .with_retry(RetryPolicy::fixed(config.retry_delay))
        .with_turn_deadline(config.turn_deadline)
}

/// Assembles an orchestrator over `registry` with tracing and metrics hooks
/// installed behind panic guards.
pub fn orchestrator_with(config: &GatewayConfig, registry: ProviderRegistry) -> ChatOrchestrator {
    let store = ConversationStore::new(config.system_prompt.as_str(), config.window);

    let turn_hooks = FanoutTurnHooks::new()
        .with(Arc::new(TracingObservabilityHooks))
        .with(Arc::new(MetricsObservabilityHooks));
    let provider_hooks = FanoutProviderHooks::new()
        .with(Arc::new(TracingObservabilityHooks))
        .with(Arc::new(MetricsObservabilityHooks));

    ChatOrchestrator::builder(Arc::new(registry), Arc::new(store))
        .policy(chat_policy(config))
        .hooks(Arc::new(SafeTurnHooks::new(turn_hooks)))
        .provider_hooks(Arc::new(SafeProviderHooks::new(provider_hooks)))
        .build()
}

pub fn build_orchestrator(config: &GatewayConfig) -> Result<ChatOrchestrator, ProviderError> {
    Ok(orchestrator_with(config, build_registry(config)?))
}
