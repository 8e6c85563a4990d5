use std::fmt::{Debug, Formatter};

use scommon::BoxFuture;

use crate::{
    BoxedEventStream, Credential, Message, ModelResponse, ProviderError, ProviderId,
    ProviderRequest,
};

pub type ProviderFuture<'a, T> = BoxFuture<'a, T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub native_streaming: bool,
}

impl ProviderCapabilities {
    pub const STREAMING: Self = Self {
        native_streaming: true,
    };

    pub const COMPLETE_ONLY: Self = Self {
        native_streaming: false,
    };
}

/// Raw adapter output before normalization into fragments.
pub enum RawResponse<'a> {
    Stream(BoxedEventStream<'a>),
    Complete(ModelResponse),
}

impl Debug for RawResponse<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("RawResponse::Stream(..)"),
            Self::Complete(response) => f
                .debug_tuple("RawResponse::Complete")
                .field(response)
                .finish(),
        }
    }
}

impl<'a> RawResponse<'a> {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Rejects a response whose shape contradicts what the provider declared.
    ///
    /// The mismatch is an adapter fault rather than a credential fault, so it
    /// surfaces as `InvalidRequest` and never rotates keys.
    pub fn conforming_to(
        self,
        provider: ProviderId,
        capabilities: ProviderCapabilities,
    ) -> Result<Self, ProviderError> {
        match (self.is_stream(), capabilities.native_streaming) {
            (true, false) => Err(ProviderError::invalid_request(format!(
                "{provider} declares complete responses but returned a stream"
            ))),
            (false, true) => Err(ProviderError::invalid_request(format!(
                "{provider} declares native streaming but returned a complete response"
            ))),
            _ => Ok(self),
        }
    }
}

pub trait ModelProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Shapes a conversation snapshot into this provider's request form.
    fn build_request(
        &self,
        conversation: &[Message],
        credential: &Credential,
    ) -> Result<ProviderRequest, ProviderError>;

    /// Sends the request. Streaming providers return `RawResponse::Stream`,
    /// others `RawResponse::Complete`; transport, auth, and quota failures
    /// surface as `Err` so callers can rotate credentials.
    fn invoke<'a>(
        &'a self,
        request: ProviderRequest,
    ) -> ProviderFuture<'a, Result<RawResponse<'a>, ProviderError>>;
}
