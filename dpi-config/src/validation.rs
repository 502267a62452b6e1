//! Custom validation functions for configuration.

use std::collections::BTreeMap;

use validator::ValidationError;

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(?i)(trace|debug|info|warn|error)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that every classifier rule names both a server and an application.
pub fn validate_rules(rules: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if rules
        .iter()
        .any(|(server, app)| server.trim().is_empty() || app.trim().is_empty())
    {
        return Err(ValidationError::new("empty_classifier_rule"));
    }
    Ok(())
}

/// Validate that no listed application name is blank.
pub fn validate_app_names(names: &[String]) -> Result<(), ValidationError> {
    if names.iter().any(|name| name.trim().is_empty()) {
        return Err(ValidationError::new("empty_app_name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_levels() {
        for level in ["trace", "DEBUG", "info", "Warn", "error"] {
            assert!(validate_log_level(level).is_ok(), "{level}");
        }
        assert!(validate_log_level("verbose").is_err());
        assert!(validate_log_level("").is_err());
    }

    #[test]
    fn rejects_blank_rules() {
        let mut rules = BTreeMap::new();
        rules.insert("github.com".to_string(), "GitHub".to_string());
        assert!(validate_rules(&rules).is_ok());
        rules.insert(" ".to_string(), "GitHub".to_string());
        assert!(validate_rules(&rules).is_err());
    }
}
