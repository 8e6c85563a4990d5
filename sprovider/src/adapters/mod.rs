#[cfg(feature = "provider-openai")]
pub mod openai;

#[cfg(feature = "provider-claude")]
pub mod claude;

mod http;
