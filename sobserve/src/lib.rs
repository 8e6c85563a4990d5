//! Observability hooks for credential rotation and chat turn lifecycles.
//!
//! ```rust
//! use sobserve::{MetricsObservabilityHooks, SafeProviderHooks, TracingObservabilityHooks};
//!
//! let _provider_hooks = SafeProviderHooks::new(TracingObservabilityHooks);
//! let _metrics = MetricsObservabilityHooks;
//! ```

mod fanout;
mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use fanout::{FanoutProviderHooks, FanoutTurnHooks};
pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{SafeProviderHooks, SafeTurnHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        FanoutProviderHooks, FanoutTurnHooks, MetricsObservabilityHooks, SafeProviderHooks,
        SafeTurnHooks, TracingObservabilityHooks,
    };
}
