//! Open registry of application identifiers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Compact application identifier. Resolve its name through the
/// [`AppRegistry`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppTag(u16);

impl AppTag {
    pub const UNKNOWN: AppTag = AppTag(0);

    #[inline]
    pub fn id(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

impl Default for AppTag {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Identifiers registered by [`AppRegistry::with_defaults`].
pub const DEFAULT_APPS: &[&str] = &[
    "HTTP",
    "HTTPS",
    "DNS",
    "TLS",
    "QUIC",
    "Google",
    "Facebook",
    "YouTube",
    "Twitter",
    "Instagram",
    "Netflix",
    "Amazon",
    "Microsoft",
    "Apple",
    "WhatsApp",
    "Telegram",
    "TikTok",
    "Spotify",
    "Zoom",
    "Discord",
    "GitHub",
    "Cloudflare",
];

const UNKNOWN_NAME: &str = "Unknown";

/// Bidirectional mapping between application names and tags.
///
/// Names are matched case-insensitively; the spelling of the first
/// registration is kept for display.
#[derive(Debug, Clone)]
pub struct AppRegistry {
    names: Vec<String>,
    by_key: HashMap<String, AppTag>,
}

impl AppRegistry {
    /// A registry holding only [`AppTag::UNKNOWN`].
    pub fn new() -> Self {
        let mut by_key = HashMap::new();
        by_key.insert(UNKNOWN_NAME.to_ascii_lowercase(), AppTag::UNKNOWN);
        Self {
            names: vec![UNKNOWN_NAME.to_string()],
            by_key,
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in DEFAULT_APPS {
            registry.register(name);
        }
        registry
    }

    /// Returns the tag for `name`, registering it first if needed.
    ///
    /// Saturates at `u16::MAX` distinct names; further names map to
    /// [`AppTag::UNKNOWN`].
    pub fn register(&mut self, name: &str) -> AppTag {
        let key = name.trim().to_ascii_lowercase();
        if key.is_empty() {
            return AppTag::UNKNOWN;
        }
        if let Some(tag) = self.by_key.get(&key) {
            return *tag;
        }
        let Ok(id) = u16::try_from(self.names.len()) else {
            return AppTag::UNKNOWN;
        };
        let tag = AppTag(id);
        self.names.push(name.trim().to_string());
        self.by_key.insert(key, tag);
        tag
    }

    pub fn lookup(&self, name: &str) -> Option<AppTag> {
        self.by_key.get(&name.trim().to_ascii_lowercase()).copied()
    }

    /// Display name of `tag`; tags from another registry resolve to "Unknown".
    pub fn name(&self, tag: AppTag) -> &str {
        self.names
            .get(tag.0 as usize)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_NAME)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_always_present() {
        let registry = AppRegistry::new();
        assert_eq!(registry.lookup("unknown"), Some(AppTag::UNKNOWN));
        assert_eq!(registry.name(AppTag::UNKNOWN), "Unknown");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn defaults_are_registered() {
        let registry = AppRegistry::with_defaults();
        assert_eq!(registry.len(), DEFAULT_APPS.len() + 1);
        let tag = registry.lookup("youtube").unwrap();
        assert_eq!(registry.name(tag), "YouTube");
    }

    #[test]
    fn register_is_idempotent_and_case_insensitive() {
        let mut registry = AppRegistry::with_defaults();
        let a = registry.register("Mastodon");
        let b = registry.register("MASTODON");
        assert_eq!(a, b);
        assert!(!a.is_unknown());
        assert_eq!(registry.name(a), "Mastodon");
    }

    #[test]
    fn blank_names_map_to_unknown() {
        let mut registry = AppRegistry::new();
        assert_eq!(registry.register(""), AppTag::UNKNOWN);
        assert_eq!(registry.register("   "), AppTag::UNKNOWN);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn foreign_tag_resolves_to_unknown() {
        let small = AppRegistry::new();
        let mut large = AppRegistry::with_defaults();
        let tag = large.register("Signal");
        assert_eq!(small.name(tag), "Unknown");
    }
}
