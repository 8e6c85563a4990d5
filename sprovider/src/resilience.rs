//! Credential-rotating retry policy and operational hook contracts.

use std::future::Future;
use std::time::Duration;

use crate::{Credential, KeyRotator, ProviderError, ProviderId};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_backoff: delay,
            max_backoff: delay,
            backoff_multiplier: 1.0,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Attempts allowed for a pool of `pool_size` credentials: one per slot,
    /// further capped by `max_attempts`.
    pub fn attempts_for_pool(&self, pool_size: usize) -> u32 {
        let pool = u32::try_from(pool_size).unwrap_or(u32::MAX);
        pool.min(self.max_attempts)
    }

    pub fn should_retry(&self, attempt: u32, limit: u32, error: &ProviderError) -> bool {
        error.rotates_credential() && attempt < limit
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = (attempt.saturating_sub(1)) as i32;
        let unbounded = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(unbounded.min(self.max_backoff.as_secs_f64()))
    }
}

pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _provider: ProviderId, _slot: usize, _attempt: u32) {}

    fn on_credential_failed(&self, _provider: ProviderId, _slot: usize, _error: &ProviderError) {}

    fn on_pool_reset(&self, _provider: ProviderId) {}

    fn on_retry_scheduled(
        &self,
        _provider: ProviderId,
        _attempt: u32,
        _delay: Duration,
        _error: &ProviderError,
    ) {
    }

    fn on_success(&self, _provider: ProviderId, _attempts: u32) {}

    fn on_failure(&self, _provider: ProviderId, _attempts: u32, _error: &ProviderError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}

/// Successful outcome of [`execute_with_rotation`] together with the
/// credential that produced it.
#[derive(Debug)]
pub struct Rotated<T> {
    pub value: T,
    pub credential: Credential,
    pub attempts: u32,
}

/// Runs `execute` with successive credentials from `rotator`.
///
/// A failure that implicates the credential marks it failed, waits the
/// policy delay and moves on to the next slot. At most
/// `policy.attempts_for_pool(rotator.len())` attempts are made; running out
/// yields `Exhausted` carrying the last attempt's message. Failures that do
/// not implicate the credential are returned unchanged.
pub async fn execute_with_rotation<T, Op, OpFuture, Sleep, SleepFuture>(
    provider: ProviderId,
    rotator: &KeyRotator,
    policy: &RetryPolicy,
    hooks: &dyn ProviderOperationHooks,
    mut execute: Op,
    mut sleep: Sleep,
) -> Result<Rotated<T>, ProviderError>
where
    Op: FnMut(Credential, u32) -> OpFuture,
    OpFuture: Future<Output = Result<T, ProviderError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
{
    let limit = policy.attempts_for_pool(rotator.len());
    if limit == 0 {
        let error = ProviderError::exhausted(format!("no {provider} credentials configured"));
        hooks.on_failure(provider, 0, &error);
        return Err(error);
    }

    let mut attempt = 1;

    loop {
        let acquired = rotator.acquire()?;
        if acquired.pool_reset {
            hooks.on_pool_reset(provider);
        }

        let credential = acquired.credential;
        hooks.on_attempt_start(provider, credential.slot(), attempt);

        match execute(credential.clone(), attempt).await {
            Ok(value) => {
                hooks.on_success(provider, attempt);
                return Ok(Rotated {
                    value,
                    credential,
                    attempts: attempt,
                });
            }
            Err(error) if !error.rotates_credential() => {
                hooks.on_failure(provider, attempt, &error);
                return Err(error);
            }
            Err(error) => {
                rotator.mark_failed(&credential)?;
                hooks.on_credential_failed(provider, credential.slot(), &error);

                if policy.should_retry(attempt, limit, &error) {
                    let delay = policy.backoff_for_attempt(attempt);
                    hooks.on_retry_scheduled(provider, attempt, delay, &error);
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                let exhausted = ProviderError::exhausted(error.message);
                hooks.on_failure(provider, attempt, &exhausted);
                return Err(exhausted);
            }
        }
    }
}
