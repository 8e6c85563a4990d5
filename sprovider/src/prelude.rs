//! Common `sprovider` imports for downstream crates.

pub use crate::{
    BoxedEventStream, Credential, FragmentStream, KeyRotator, Message, ModelEventStream,
    ModelProvider, ModelResponse, NoopOperationHooks, ProviderCapabilities, ProviderEntry,
    ProviderError, ProviderErrorKind, ProviderId, ProviderOperationHooks, ProviderRegistry,
    ProviderRequest, RawResponse, RetryPolicy, Role, SecretString, StopReason, StreamEvent,
    StreamFragment, StreamNormalizer, TokenUsage, execute_with_rotation,
};
pub use scommon::{BoxFuture, GenerationOptions};
