//! Structured log events for credential rotation and turn lifecycles.
//!
//! Key material never reaches a log line; credentials are identified by
//! their pool slot only.
//!
//! ```rust
//! use schat::ChatTurnHooks;
//! use sobserve::TracingObservabilityHooks;
//!
//! fn accepts_turn_hooks(_hooks: &dyn ChatTurnHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_turn_hooks(&hooks);
//! ```

use std::time::Duration;

use schat::{ChatError, ChatTurnHooks, ChatTurnResult, TurnPhase};
use scommon::UserId;
use sprovider::{ProviderError, ProviderId, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, slot: usize, attempt: u32) {
        tracing::debug!(
            phase = "provider",
            event = "attempt_start",
            provider = %provider,
            slot,
            attempt
        );
    }

    fn on_credential_failed(&self, provider: ProviderId, slot: usize, error: &ProviderError) {
        tracing::warn!(
            phase = "provider",
            event = "credential_failed",
            provider = %provider,
            slot,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_pool_reset(&self, provider: ProviderId) {
        tracing::warn!(phase = "provider", event = "pool_reset", provider = %provider);
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        tracing::info!(
            phase = "provider",
            event = "retry_scheduled",
            provider = %provider,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable
        );
    }

    fn on_success(&self, provider: ProviderId, attempts: u32) {
        tracing::debug!(
            phase = "provider",
            event = "success",
            provider = %provider,
            attempts
        );
    }

    fn on_failure(&self, provider: ProviderId, attempts: u32, error: &ProviderError) {
        tracing::error!(
            phase = "provider",
            event = "failure",
            provider = %provider,
            attempts,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl ChatTurnHooks for TracingObservabilityHooks {
    fn on_turn_start(&self, user_id: &UserId, provider: ProviderId) {
        tracing::info!(
            phase = "turn",
            event = "start",
            user_id = %user_id,
            provider = %provider
        );
    }

    fn on_phase_change(&self, user_id: &UserId, provider: ProviderId, from: TurnPhase, to: TurnPhase) {
        tracing::debug!(
            phase = "turn",
            event = "phase_change",
            user_id = %user_id,
            provider = %provider,
            from = from.as_str(),
            to = to.as_str()
        );
    }

    fn on_turn_complete(&self, user_id: &UserId, result: &ChatTurnResult) {
        tracing::info!(
            phase = "turn",
            event = "complete",
            user_id = %user_id,
            provider = %result.provider,
            slot = result.credential_slot,
            attempts = result.attempts,
            fragments = result.fragments,
            reply_chars = result.assistant_message.chars().count()
        );
    }

    fn on_turn_failed(&self, user_id: &UserId, provider: Option<ProviderId>, error: &ChatError) {
        let provider = provider.map(ProviderId::as_str).unwrap_or("none");
        if error.is_client_error() {
            tracing::info!(
                phase = "turn",
                event = "rejected",
                user_id = %user_id,
                provider,
                error_kind = ?error.kind,
                error = %error
            );
        } else {
            tracing::error!(
                phase = "turn",
                event = "failure",
                user_id = %user_id,
                provider,
                error_kind = ?error.kind,
                error = %error
            );
        }
    }

    fn on_turn_cancelled(&self, user_id: &UserId, provider: ProviderId, phase: TurnPhase) {
        tracing::info!(
            phase = "turn",
            event = "cancelled",
            user_id = %user_id,
            provider = %provider,
            during = phase.as_str()
        );
    }
}
