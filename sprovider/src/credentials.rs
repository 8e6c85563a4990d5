//! Secure in-memory credential pool with round-robin key rotation.
//!
//! ```rust
//! use sprovider::{KeyRotator, SecretString};
//!
//! let rotator = KeyRotator::new(vec![SecretString::new("sk-a"), SecretString::new("sk-b")]);
//! let first = rotator.next().expect("pool is not empty");
//! rotator.mark_failed(&first).expect("lock is healthy");
//!
//! let second = rotator.next().expect("pool is not empty");
//! assert_eq!(second.slot(), 1);
//! assert_eq!(format!("{first:?}"), "Credential { slot: 0, secret: [REDACTED] }");
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{ProviderError, ProviderId};

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// One pool slot handed out by [`KeyRotator::next`].
#[derive(Clone)]
pub struct Credential {
    slot: usize,
    secret: Arc<SecretString>,
}

impl Credential {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && Arc::ptr_eq(&self.secret, &other.secret)
    }
}

impl Eq for Credential {}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("slot", &self.slot)
            .field("secret", &self.secret)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Active,
    Failed,
}

/// A credential lease plus whether the failed set was cleared to produce it.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub credential: Credential,
    pub pool_reset: bool,
}

#[derive(Debug)]
struct RotationState {
    cursor: usize,
    failed: Vec<bool>,
}

/// Fixed pool of API keys rotated in strict round-robin order.
///
/// `next` never returns a failed slot while an active one exists. When every
/// slot is failed the failed set is cleared in the same critical section and
/// rotation continues from the cursor.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<Arc<SecretString>>,
    state: Mutex<RotationState>,
}

impl KeyRotator {
    pub fn new(keys: Vec<SecretString>) -> Self {
        let failed = vec![false; keys.len()];
        Self {
            keys: keys.into_iter().map(Arc::new).collect(),
            state: Mutex::new(RotationState { cursor: 0, failed }),
        }
    }

    /// Builds a pool for `provider`, rejecting blank keys and keys that do not
    /// carry the provider's expected prefix.
    pub fn for_provider<I, S>(provider: ProviderId, keys: I) -> Result<Self, ProviderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefix = expected_key_prefix(provider);
        let mut secrets = Vec::new();

        for key in keys {
            let secret = SecretString::new(key.into().trim());
            if secret.is_empty() {
                return Err(ProviderError::authentication("api key must not be empty"));
            }

            if !secret.expose().starts_with(prefix) {
                return Err(ProviderError::authentication(format!(
                    "{provider} API key must start with '{prefix}'"
                )));
            }

            secrets.push(secret);
        }

        Ok(Self::new(secrets))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn next(&self) -> Result<Credential, ProviderError> {
        self.acquire().map(|acquired| acquired.credential)
    }

    pub fn acquire(&self) -> Result<Acquired, ProviderError> {
        if self.keys.is_empty() {
            return Err(ProviderError::exhausted("credential pool is empty"));
        }

        let mut state = self.state()?;
        let mut pool_reset = false;
        if state.failed.iter().all(|failed| *failed) {
            state.failed.fill(false);
            pool_reset = true;
        }

        let len = self.keys.len();
        for offset in 0..len {
            let slot = (state.cursor + offset) % len;
            if !state.failed[slot] {
                state.cursor = (slot + 1) % len;
                return Ok(Acquired {
                    credential: Credential {
                        slot,
                        secret: Arc::clone(&self.keys[slot]),
                    },
                    pool_reset,
                });
            }
        }

        Err(ProviderError::other("credential rotation found no active slot"))
    }

    /// Marks the credential's slot failed. Credentials from another pool are ignored.
    pub fn mark_failed(&self, credential: &Credential) -> Result<(), ProviderError> {
        if !self.owns(credential) {
            return Ok(());
        }

        self.state()?.failed[credential.slot] = true;
        Ok(())
    }

    pub fn status(&self, slot: usize) -> Result<Option<CredentialStatus>, ProviderError> {
        let state = self.state()?;
        Ok(state.failed.get(slot).map(|failed| {
            if *failed {
                CredentialStatus::Failed
            } else {
                CredentialStatus::Active
            }
        }))
    }

    pub fn is_failed(&self, slot: usize) -> Result<bool, ProviderError> {
        Ok(self.status(slot)? == Some(CredentialStatus::Failed))
    }

    pub fn failed_count(&self) -> Result<usize, ProviderError> {
        Ok(self.state()?.failed.iter().filter(|failed| **failed).count())
    }

    pub fn reset(&self) -> Result<(), ProviderError> {
        self.state()?.failed.fill(false);
        Ok(())
    }

    fn owns(&self, credential: &Credential) -> bool {
        self.keys
            .get(credential.slot)
            .is_some_and(|key| Arc::ptr_eq(key, &credential.secret))
    }

    fn state(&self) -> Result<MutexGuard<'_, RotationState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::other("key rotator lock poisoned"))
    }
}

pub fn expected_key_prefix(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAi => "sk-",
        ProviderId::Claude => "sk-ant-",
    }
}
