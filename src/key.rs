//! Cache key namespacing.
//!
//! Services sharing one Redis database keep their keys apart with a prefix:
//! a [`Cache`](crate::cache::Cache) configured with prefix `"orders"` stores
//! `user:42` under `orders:user:42`.

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Prefix applied to every key a cache client touches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// Namespace for `prefix`. Trailing separators are ignored, so `"app"`
    /// and `"app:"` are the same namespace.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_end_matches(SEPARATOR).to_string();
        KeyNamespace { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full backend key for a caller key.
    pub fn apply(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.prefix, SEPARATOR, key)
        }
    }
}

/// Build composite key from multiple parts.
///
/// ```
/// use service_kit::key::composite;
///
/// assert_eq!(composite(&["user", "42", "profile"]), "user:42:profile");
/// ```
pub fn composite(parts: &[&str]) -> String {
    parts.join(":")
}
