//! Server-name classification rules and blocking policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Rule table and blocking policy for the SNI classifier.
#[derive(Debug, Default, Serialize, Deserialize, Validate, Clone)]
pub struct ClassifierConfig {
    /// Exact server name → application name.
    #[validate(custom(function = validation::validate_rules))]
    #[serde(default)]
    pub rules: BTreeMap<String, String>,

    /// Applications whose flows are dropped once classified.
    #[validate(custom(function = validation::validate_app_names))]
    #[serde(default)]
    pub blocked_apps: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_blocked_app() {
        let config = ClassifierConfig {
            blocked_apps: vec!["TikTok".into(), "".into()],
            ..ClassifierConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
