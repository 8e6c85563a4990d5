//! Provider abstractions for the solace chat gateway.
//!
//! The crate defines the provider-agnostic message model, the
//! [`ModelProvider`] adapter seam, credential pools with round-robin
//! rotation, and the normalizer that turns every provider's output into one
//! incremental fragment stream.
//!
//! ```rust
//! use sprovider::{KeyRotator, ProviderId, RetryPolicy, SecretString};
//!
//! let pool = KeyRotator::new(vec![SecretString::new("sk-one"), SecretString::new("sk-two")]);
//! let policy = RetryPolicy::default();
//!
//! assert_eq!(policy.attempts_for_pool(pool.len()), 2);
//! assert_eq!("gpt".parse::<ProviderId>().expect("alias"), ProviderId::OpenAi);
//! ```

pub mod credentials;
pub mod error;
pub mod model;
pub mod normalize;
pub mod prelude;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod stream;

#[cfg(any(feature = "provider-openai", feature = "provider-claude"))]
pub mod adapters;

pub use credentials::{
    Acquired, Credential, CredentialStatus, KeyRotator, SecretString, expected_key_prefix,
};
pub use error::{ProviderError, ProviderErrorKind};
pub use model::{
    Message, ModelResponse, ProviderId, ProviderRequest, Role, StopReason, TokenUsage,
};
pub use normalize::{FragmentStream, StreamFragment, StreamNormalizer};
pub use provider::{ModelProvider, ProviderCapabilities, ProviderFuture, RawResponse};
pub use registry::{ProviderEntry, ProviderRegistry};
pub use resilience::{
    NoopOperationHooks, ProviderOperationHooks, RetryPolicy, Rotated, execute_with_rotation,
};
pub use stream::{BoxedEventStream, ModelEventStream, StreamEvent, VecEventStream};
