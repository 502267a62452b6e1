//! Exact-match server-name rule table.

use std::collections::HashMap;

use super::registry::{AppRegistry, AppTag};
use super::SniClassifier;

/// Server name to application tag, matched exactly after normalization.
///
/// DNS names compare case-insensitively and may carry a trailing root dot, so
/// both are normalized away. No other matching is performed.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, AppTag>,
}

fn normalize(server_name: &str) -> String {
    server_name.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(server name, application name)` pairs,
    /// registering unseen application names in `registry`.
    pub fn from_pairs<'a, I>(pairs: I, registry: &mut AppRegistry) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::new();
        for (server_name, app) in pairs {
            let tag = registry.register(app);
            table.insert(server_name, tag);
        }
        table
    }

    /// Adds or replaces the rule for `server_name`.
    pub fn insert(&mut self, server_name: &str, tag: AppTag) -> Option<AppTag> {
        self.rules.insert(normalize(server_name), tag)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl SniClassifier for RuleTable {
    fn classify(&self, server_name: &str) -> AppTag {
        self.rules
            .get(&normalize(server_name))
            .copied()
            .unwrap_or(AppTag::UNKNOWN)
    }
}
