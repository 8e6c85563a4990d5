//! Hook sets that forward every callback to several observers in order.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sobserve::{FanoutProviderHooks, MetricsObservabilityHooks, TracingObservabilityHooks};
//!
//! let hooks = FanoutProviderHooks::new()
//!     .with(Arc::new(TracingObservabilityHooks))
//!     .with(Arc::new(MetricsObservabilityHooks));
//! assert_eq!(hooks.len(), 2);
//! ```

use std::sync::Arc;
use std::time::Duration;

use schat::{ChatError, ChatTurnHooks, ChatTurnResult, TurnPhase};
use scommon::UserId;
use sprovider::{ProviderError, ProviderId, ProviderOperationHooks};

#[derive(Default, Clone)]
pub struct FanoutProviderHooks {
    hooks: Vec<Arc<dyn ProviderOperationHooks>>,
}

impl FanoutProviderHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl ProviderOperationHooks for FanoutProviderHooks {
    fn on_attempt_start(&self, provider: ProviderId, slot: usize, attempt: u32) {
        for hooks in &self.hooks {
            hooks.on_attempt_start(provider, slot, attempt);
        }
    }

    fn on_credential_failed(&self, provider: ProviderId, slot: usize, error: &ProviderError) {
        for hooks in &self.hooks {
            hooks.on_credential_failed(provider, slot, error);
        }
    }

    fn on_pool_reset(&self, provider: ProviderId) {
        for hooks in &self.hooks {
            hooks.on_pool_reset(provider);
        }
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        for hooks in &self.hooks {
            hooks.on_retry_scheduled(provider, attempt, delay, error);
        }
    }

    fn on_success(&self, provider: ProviderId, attempts: u32) {
        for hooks in &self.hooks {
            hooks.on_success(provider, attempts);
        }
    }

    fn on_failure(&self, provider: ProviderId, attempts: u32, error: &ProviderError) {
        for hooks in &self.hooks {
            hooks.on_failure(provider, attempts, error);
        }
    }
}

#[derive(Default, Clone)]
pub struct FanoutTurnHooks {
    hooks: Vec<Arc<dyn ChatTurnHooks>>,
}

impl FanoutTurnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hooks: Arc<dyn ChatTurnHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl ChatTurnHooks for FanoutTurnHooks {
    fn on_turn_start(&self, user_id: &UserId, provider: ProviderId) {
        for hooks in &self.hooks {
            hooks.on_turn_start(user_id, provider);
        }
    }

    fn on_phase_change(&self, user_id: &UserId, provider: ProviderId, from: TurnPhase, to: TurnPhase) {
        for hooks in &self.hooks {
            hooks.on_phase_change(user_id, provider, from, to);
        }
    }

    fn on_turn_complete(&self, user_id: &UserId, result: &ChatTurnResult) {
        for hooks in &self.hooks {
            hooks.on_turn_complete(user_id, result);
        }
    }

    fn on_turn_failed(&self, user_id: &UserId, provider: Option<ProviderId>, error: &ChatError) {
        for hooks in &self.hooks {
            hooks.on_turn_failed(user_id, provider, error);
        }
    }

    fn on_turn_cancelled(&self, user_id: &UserId, provider: ProviderId, phase: TurnPhase) {
        for hooks in &self.hooks {
            hooks.on_turn_cancelled(user_id, provider, phase);
        }
    }
}
