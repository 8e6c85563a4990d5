use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use schat::{ChatError, ChatTurnHooks, ChatTurnResult, TurnPhase};
use scommon::UserId;
use sprovider::{ProviderError, ProviderId, ProviderOperationHooks};

/// Swallows panics raised by the wrapped provider hooks.
pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ProviderOperationHooks for SafeProviderHooks<H>
where
    H: ProviderOperationHooks,
{
    fn on_attempt_start(&self, provider: ProviderId, slot: usize, attempt: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(provider, slot, attempt)
        }));
    }

    fn on_credential_failed(&self, provider: ProviderId, slot: usize, error: &ProviderError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_credential_failed(provider, slot, error)
        }));
    }

    fn on_pool_reset(&self, provider: ProviderId) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_pool_reset(provider)));
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_retry_scheduled(provider, attempt, delay, error)
        }));
    }

    fn on_success(&self, provider: ProviderId, attempts: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(provider, attempts)
        }));
    }

    fn on_failure(&self, provider: ProviderId, attempts: u32, error: &ProviderError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(provider, attempts, error)
        }));
    }
}

/// Swallows panics raised by the wrapped turn hooks.
pub struct SafeTurnHooks<H> {
    inner: H,
}

impl<H> SafeTurnHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ChatTurnHooks for SafeTurnHooks<H>
where
    H: ChatTurnHooks,
{
    fn on_turn_start(&self, user_id: &UserId, provider: ProviderId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_start(user_id, provider)
        }));
    }

    fn on_phase_change(
        &self,
        user_id: &UserId,
        provider: ProviderId,
        from: TurnPhase,
        to: TurnPhase,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_phase_change(user_id, provider, from, to)
        }));
    }

    fn on_turn_complete(&self, user_id: &UserId, result: &ChatTurnResult) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_complete(user_id, result)
        }));
    }

    fn on_turn_failed(&self, user_id: &UserId, provider: Option<ProviderId>, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_failed(user_id, provider, error)
        }));
    }

    fn on_turn_cancelled(&self, user_id: &UserId, provider: ProviderId, phase: TurnPhase) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_cancelled(user_id, provider, phase)
        }));
    }
}
