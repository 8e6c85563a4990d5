//! Command-line and environment configuration.
//!
//! Scalar settings come from flags with environment fallbacks. Credentials
//! are read from numbered slots (`OPENAI_API_KEY`, `OPENAI_API_KEY_2`, ...)
//! through a lookup function so callers control where they come from.
//!
//! ```rust
//! use clap::Parser;
//! use solace::config::{Cli, GatewayConfig};
//! use sprovider::ProviderId;
//!
//! let cli = Cli::parse_from(["solace", "--window", "6"]);
//! let config = GatewayConfig::resolve(cli, |name| match name {
//!     "OPENAI_API_KEY" => Some("sk-first".to_string()),
//!     "OPENAI_API_KEY_2" => Some("sk-second".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//!
//! assert_eq!(config.window, 6);
//! assert_eq!(config.keys_for(ProviderId::OpenAi).len(), 2);
//! assert!(config.keys_for(ProviderId::Claude).is_empty());
//! ```

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use sprovider::ProviderId;

/// Highest numbered credential slot read per provider.
pub const MAX_KEY_SLOTS: usize = 8;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a kind and empathetic therapist. Help users feel heard and understood.";

#[derive(Parser, Debug, Clone)]
#[command(name = "solace", version, about = "Streaming multi-provider chat gateway")]
pub struct Cli {
    /// HTTP listen address.
    #[arg(long, env = "SOLACE_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Messages kept per user, including the system prompt.
    #[arg(long, env = "SOLACE_WINDOW", default_value_t = 10)]
    pub window: usize,

    /// Provider used when a request names no service.
    #[arg(long, env = "SOLACE_DEFAULT_SERVICE", default_value = "openai")]
    pub default_service: String,

    #[arg(long, env = "SOLACE_SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    #[arg(long, env = "SOLACE_OPENAI_MODEL", default_value = "gpt-3.5-turbo")]
    pub openai_model: String,

    #[arg(long, env = "SOLACE_CLAUDE_MODEL", default_value = "claude-3-5-sonnet-latest")]
    pub claude_model: String,

    /// Pause between credential attempts.
    #[arg(long, env = "SOLACE_RETRY_DELAY_MS", default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Upper bound on one chat turn, end to end.
    #[arg(long, env = "SOLACE_TURN_DEADLINE_SECS", default_value_t = 120)]
    pub turn_deadline_secs: u64,

    /// Per-request timeout for provider HTTP calls.
    #[arg(long, env = "SOLACE_HTTP_TIMEOUT_SECS", default_value_t = 90)]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    MissingCredentials,
    InvalidValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credentials(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::MissingCredentials, message)
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidValue, message)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ConfigError {}

/// Fully resolved gateway settings.
#[derive(Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub window: usize,
    pub default_service: ProviderId,
    pub system_prompt: String,
    pub openai_model: String,
    pub claude_model: String,
    pub retry_delay: Duration,
    pub turn_deadline: Duration,
    pub http_timeout: Duration,
    openai_keys: Vec<String>,
    claude_keys: Vec<String>,
}

impl GatewayConfig {
    /// Combines parsed flags with credentials found through `lookup`.
    ///
    /// Fails when no provider has a key at all, or when the default service
    /// has none.
    pub fn resolve<F>(cli: Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_service = cli
            .default_service
            .parse::<ProviderId>()
            .map_err(|err| ConfigError::invalid_value(err.message))?;

        if cli.turn_deadline_secs == 0 {
            return Err(ConfigError::invalid_value(
                "turn deadline must be at least one second",
            ));
        }

        let openai_keys = key_slots(env_prefix(ProviderId::OpenAi), &lookup);
        let claude_keys = key_slots(env_prefix(ProviderId::Claude), &lookup);

        if openai_keys.is_empty() && claude_keys.is_empty() {
            return Err(ConfigError::missing_credentials(format!(
                "set {} or {} to at least one API key",
                env_prefix(ProviderId::OpenAi),
                env_prefix(ProviderId::Claude)
            )));
        }

        let config = Self {
            bind: cli.bind,
            window: cli.window,
            default_service,
            system_prompt: cli.system_prompt,
            openai_model: cli.openai_model,
            claude_model: cli.claude_model,
            retry_delay: Duration::from_millis(cli.retry_delay_ms),
            turn_deadline: Duration::from_secs(cli.turn_deadline_secs),
            http_timeout: Duration::from_secs(cli.http_timeout_secs),
            openai_keys,
            claude_keys,
        };

        if config.keys_for(default_service).is_empty() {
            return Err(ConfigError::missing_credentials(format!(
                "default service '{default_service}' has no credentials; set {}",
                env_prefix(default_service)
            )));
        }

        Ok(config)
    }

    pub fn keys_for(&self, provider: ProviderId) -> &[String] {
        match provider {
            ProviderId::OpenAi => &self.openai_keys,
            ProviderId::Claude => &self.claude_keys,
        }
    }

    /// Providers that have at least one key, in declaration order.
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|provider| !self.keys_for(*provider).is_empty())
            .collect()
    }
}

impl Debug for GatewayConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("window", &self.window)
            .field("default_service", &self.default_service)
            .field("openai_model", &self.openai_model)
            .field("claude_model", &self.claude_model)
            .field("retry_delay", &self.retry_delay)
            .field("turn_deadline", &self.turn_deadline)
            .field("http_timeout", &self.http_timeout)
            .field("openai_keys", &self.openai_keys.len())
            .field("claude_keys", &self.claude_keys.len())
            .finish_non_exhaustive()
    }
}

pub fn env_prefix(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAi => "OPENAI_API_KEY",
        ProviderId::Claude => "ANTHROPIC_API_KEY",
    }
}

/// Reads `base`, `base_2`, ... `base_{MAX_KEY_SLOTS}`. Blank slots are
/// skipped, so gaps in the numbering are allowed.
fn key_slots<F>(base: &str, lookup: &F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    (1..=MAX_KEY_SLOTS)
        .map(|slot| match slot {
            1 => base.to_string(),
            n => format!("{base}_{n}"),
        })
        .filter_map(|name| lookup(&name))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("solace").chain(args.iter().copied()))
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn numbered_slots_are_collected_in_order_skipping_gaps() {
        let config = GatewayConfig::resolve(
            cli(&[]),
            lookup(&[
                ("OPENAI_API_KEY", "sk-one"),
                ("OPENAI_API_KEY_3", " sk-three "),
                ("OPENAI_API_KEY_4", "  "),
                ("OPENAI_API_KEY_9", "sk-ignored"),
                ("ANTHROPIC_API_KEY_2", "sk-ant-two"),
            ]),
        )
        .expect("config");

        assert_eq!(config.keys_for(ProviderId::OpenAi), ["sk-one", "sk-three"]);
        assert_eq!(config.keys_for(ProviderId::Claude), ["sk-ant-two"]);
        assert_eq!(
            config.configured_providers(),
            vec![ProviderId::OpenAi, ProviderId::Claude]
        );
    }

    #[test]
    fn defaults_follow_gateway_conventions() {
        let config = GatewayConfig::resolve(cli(&[]), lookup(&[("OPENAI_API_KEY", "sk-a")]))
            .expect("config");

        assert_eq!(config.bind, "127.0.0.1:5000".parse::<SocketAddr>().expect("addr"));
        assert_eq!(config.window, 10);
        assert_eq!(config.default_service, ProviderId::OpenAi);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert_eq!(config.turn_deadline, Duration::from_secs(120));
    }

    #[test]
    fn missing_keys_are_fatal() {
        let error = GatewayConfig::resolve(cli(&[]), lookup(&[])).expect_err("no keys");
        assert_eq!(error.kind, ConfigErrorKind::MissingCredentials);

        let error = GatewayConfig::resolve(
            cli(&["--default-service", "claude"]),
            lookup(&[("OPENAI_API_KEY", "sk-a")]),
        )
        .expect_err("default without keys");
        assert_eq!(error.kind, ConfigErrorKind::MissingCredentials);
        assert!(error.message.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn unknown_default_service_is_rejected() {
        let error = GatewayConfig::resolve(
            cli(&["--default-service", "gemini"]),
            lookup(&[("OPENAI_API_KEY", "sk-a")]),
        )
        .expect_err("unknown service");
        assert_eq!(error.kind, ConfigErrorKind::InvalidValue);
    }

    #[test]
    fn debug_output_never_contains_keys() {
        let config = GatewayConfig::resolve(
            cli(&[]),
            lookup(&[("OPENAI_API_KEY", "sk-very-secret")]),
        )
        .expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("openai_keys: 1"));
    }
}
