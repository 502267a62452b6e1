//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Unified configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found error.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration validation error.
    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// Figment parsing error.
    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut output = String::new();
    collect_errors(errors, "", &mut output);
    output
}

// Nested sections report their fields as `section.field`.
fn collect_errors(errors: &ValidationErrors, prefix: &str, output: &mut String) {
    use std::fmt::Write;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errors) => {
                let _ = writeln!(output, "Field '{}':", path);
                for error in errors {
                    let message = match &error.message {
                        Some(msg) => msg.to_string(),
                        None => error.code.to_string(),
                    };
                    let _ = writeln!(output, "  - {}", message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, &path, output),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(nested, &format!("{path}[{index}]"), output);
                }
            }
        }
    }
}
