mod provider;
mod serde_api;
mod tests;
mod transport;
mod types;

pub use provider::{DEFAULT_OPENAI_MODEL, OpenAiProvider};
pub use transport::{OPENAI_BASE_URL, OpenAiChunkStream, OpenAiHttpTransport, OpenAiTransport};
pub use types::{
    OpenAiFinishReason, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiRole,
    OpenAiStreamChunk, OpenAiUsage,
};
