//! Startup-built lookup table from provider names to adapters and key pools.
//!
//! ```rust
//! use sprovider::{ProviderErrorKind, ProviderRegistry};
//!
//! let registry = ProviderRegistry::new();
//! assert!(registry.is_empty());
//!
//! let err = registry.resolve("openai").err().expect("nothing registered");
//! assert_eq!(err.kind, ProviderErrorKind::UnknownProvider);
//! ```

use std::sync::Arc;

use scommon::Registry;

use crate::{KeyRotator, ModelProvider, ProviderError, ProviderId};

/// An adapter paired with the credential pool it draws from.
#[derive(Clone)]
pub struct ProviderEntry {
    pub provider: Arc<dyn ModelProvider>,
    pub credentials: Arc<KeyRotator>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("provider", &self.provider.id())
            .field("credentials", &self.credentials.len())
            .finish()
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Registry<ProviderId, ProviderEntry>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, provider: P, credentials: KeyRotator)
    where
        P: ModelProvider + 'static,
    {
        self.register_shared(Arc::new(provider), Arc::new(credentials));
    }

    pub fn register_shared(
        &mut self,
        provider: Arc<dyn ModelProvider>,
        credentials: Arc<KeyRotator>,
    ) {
        self.providers.insert(
            provider.id(),
            ProviderEntry {
                provider,
                credentials,
            },
        );
    }

    pub fn get(&self, provider_id: ProviderId) -> Option<ProviderEntry> {
        self.providers.get(&provider_id).cloned()
    }

    /// Maps a caller-supplied service name to its entry. Unknown names and
    /// known providers that were never configured both fail the same way.
    pub fn resolve(&self, name: &str) -> Result<(ProviderId, ProviderEntry), ProviderError> {
        let provider_id = name.parse::<ProviderId>()?;
        self.get(provider_id)
            .map(|entry| (provider_id, entry))
            .ok_or_else(|| {
                ProviderError::unknown_provider(format!("provider '{provider_id}' is not configured"))
            })
    }

    pub fn contains(&self, provider_id: ProviderId) -> bool {
        self.providers.contains_key(&provider_id)
    }

    /// Registered providers in declaration order.
    pub fn ids(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|id| self.contains(*id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
