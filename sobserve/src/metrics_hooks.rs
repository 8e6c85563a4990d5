//! `metrics` facade counters and histograms for rotation and turns.
//!
//! ```rust
//! use sobserve::MetricsObservabilityHooks;
//! use sprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use schat::{ChatError, ChatTurnHooks, ChatTurnResult, TurnPhase};
use scommon::UserId;
use sprovider::{ProviderError, ProviderId, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, slot: usize, _attempt: u32) {
        metrics::counter!(
            "solace_provider_attempt_start_total",
            "provider" => provider.as_str(),
            "slot" => slot.to_string()
        )
        .increment(1);
    }

    fn on_credential_failed(&self, provider: ProviderId, slot: usize, error: &ProviderError) {
        metrics::counter!(
            "solace_provider_credential_failed_total",
            "provider" => provider.as_str(),
            "slot" => slot.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_pool_reset(&self, provider: ProviderId) {
        metrics::counter!("solace_provider_pool_reset_total", "provider" => provider.as_str())
            .increment(1);
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        _attempt: u32,
        delay: Duration,
        _error: &ProviderError,
    ) {
        metrics::histogram!(
            "solace_provider_retry_delay_seconds",
            "provider" => provider.as_str()
        )
        .record(delay.as_secs_f64());
    }

    fn on_success(&self, provider: ProviderId, attempts: u32) {
        metrics::counter!("solace_provider_success_total", "provider" => provider.as_str())
            .increment(1);
        metrics::histogram!(
            "solace_provider_attempts_per_success",
            "provider" => provider.as_str()
        )
        .record(attempts as f64);
    }

    fn on_failure(&self, provider: ProviderId, attempts: u32, error: &ProviderError) {
        metrics::counter!(
            "solace_provider_failure_total",
            "provider" => provider.as_str(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "solace_provider_attempts_per_failure",
            "provider" => provider.as_str()
        )
        .record(attempts as f64);
    }
}

impl ChatTurnHooks for MetricsObservabilityHooks {
    fn on_turn_start(&self, _user_id: &UserId, provider: ProviderId) {
        metrics::counter!("solace_turn_start_total", "provider" => provider.as_str()).increment(1);
        metrics::gauge!("solace_turn_in_flight", "provider" => provider.as_str()).increment(1.0);
    }

    fn on_turn_complete(&self, _user_id: &UserId, result: &ChatTurnResult) {
        let provider = result.provider.as_str();
        metrics::counter!("solace_turn_complete_total", "provider" => provider).increment(1);
        metrics::histogram!("solace_turn_fragments", "provider" => provider)
            .record(result.fragments as f64);
        metrics::gauge!("solace_turn_in_flight", "provider" => provider).decrement(1.0);
    }

    fn on_turn_failed(&self, _user_id: &UserId, provider: Option<ProviderId>, error: &ChatError) {
        let label = provider.map(ProviderId::as_str).unwrap_or("none");
        metrics::counter!(
            "solace_turn_failure_total",
            "provider" => label,
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);

        // Turns rejected before resolution were never counted in flight.
        if provider.is_some() {
            metrics::gauge!("solace_turn_in_flight", "provider" => label).decrement(1.0);
        }
    }

    fn on_turn_cancelled(&self, _user_id: &UserId, provider: ProviderId, phase: TurnPhase) {
        metrics::counter!(
            "solace_turn_cancelled_total",
            "provider" => provider.as_str(),
            "phase" => phase.as_str()
        )
        .increment(1);
        metrics::gauge!("solace_turn_in_flight", "provider" => provider.as_str()).decrement(1.0);
    }
}
