//! Key Codec
//!
//! Maps logical key names onto namespaced storage keys.

use crate::config::DEFAULT_KEY_PREFIX;

/// Fixed-prefix namespacing for storage keys.
///
/// Encoding is a pure prefix concatenation, so distinct logical keys never
/// collide once namespaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    prefix: String,
}

impl KeyCodec {
    /// Creates a codec with a custom prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the namespaced storage key for `logical`.
    pub fn encode(&self, logical: &str) -> String {
        let mut key = String::with_capacity(self.prefix.len() + logical.len());
        key.push_str(&self.prefix);
        key.push_str(logical);
        key
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

/// Namespaces `logical` with the default `_cache_` prefix.
pub fn namespace(logical: &str) -> String {
    KeyCodec::default().encode(logical)
}
