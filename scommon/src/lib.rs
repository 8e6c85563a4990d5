//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use scommon::{GenerationOptions, TraceId, UserId};
//!
//! let user = UserId::from("user-1");
//! let trace = TraceId::new("trace-1");
//!
//! let options = GenerationOptions::default().with_temperature(0.3);
//! assert_eq!(user.as_str(), "user-1");
//! assert_eq!(trace.to_string(), "trace-1");
//! assert_eq!(options.temperature, Some(0.3));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use scommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use scommon::{TraceId, UserId};
    //!
    //! assert_eq!(UserId::from_optional(None), UserId::default());
    //! assert_eq!(UserId::from_optional(Some("  ")).as_str(), "default");
    //! assert_eq!(UserId::from_optional(Some("ada")).as_str(), "ada");
    //! assert_eq!(TraceId::from("trace-42").as_str(), "trace-42");
    //! ```

    use std::fmt::{Display, Formatter};

    /// Sentinel partition used when a caller does not identify itself.
    pub const DEFAULT_USER_ID: &str = "default";

    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct UserId(String);

    impl UserId {
        pub fn new(value: impl Into<String>) -> Self {
            Self(value.into())
        }

        /// Maps a missing or blank caller-supplied id to the default partition.
        pub fn from_optional(value: Option<&str>) -> Self {
            match value.map(str::trim) {
                Some(value) if !value.is_empty() => Self(value.to_string()),
                _ => Self::default(),
            }
        }

        pub fn as_str(&self) -> &str {
            self.0.as_str()
        }
    }

    impl Default for UserId {
        fn default() -> Self {
            Self(DEFAULT_USER_ID.to_string())
        }
    }

    impl Display for UserId {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<String> for UserId {
        fn from(value: String) -> Self {
            Self(value)
        }
    }

    impl From<&str> for UserId {
        fn from(value: &str) -> Self {
            Self(value.to_string())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct TraceId(String);

    impl TraceId {
        pub fn new(value: impl Into<String>) -> Self {
            Self(value.into())
        }

        pub fn as_str(&self) -> &str {
            self.0.as_str()
        }
    }

    impl Display for TraceId {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<String> for TraceId {
        fn from(value: String) -> Self {
            Self(value)
        }
    }

    impl From<&str> for TraceId {
        fn from(value: &str) -> Self {
            Self(value.to_string())
        }
    }
}

pub mod model {
    //! Shared generation settings used by request types.
    //!
    //! ```rust
    //! use scommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_tokens(128);
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_tokens, Some(128));
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.
    //!
    //! ```rust
    //! use scommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert!(registry.contains_key("alpha"));
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn keys(&self) -> impl Iterator<Item = &K> {
            self.items.keys()
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use context::{DEFAULT_USER_ID, TraceId, UserId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use registry::Registry;
