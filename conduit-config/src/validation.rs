// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field-level validation rules, reported against the API they belong to
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(api: &str, value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(api, format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    /// Validate that an optional value is present and not empty
    pub fn required(api: &str, value: Option<&str>, field: &str) -> Result<()> {
        match value {
            Some(value) => Self::not_empty(api, value, field),
            None => Err(ConfigError::invalid(api, format!("{} is required", field))),
        }
    }

    /// Validate URL format. Websocket schemes are accepted for realtime endpoints.
    pub fn is_url(api: &str, value: &str, field: &str) -> Result<()> {
        const SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

        if !SCHEMES.iter().any(|scheme| value.starts_with(scheme)) {
            return Err(ConfigError::invalid(
                api,
                format!("{} must be a valid URL, got '{}'", field, value),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("blog", "value", "endpoint").is_ok());
        assert!(ConfigValidator::not_empty("blog", "", "endpoint").is_err());
        assert!(ConfigValidator::not_empty("blog", "   ", "endpoint").is_err());
    }

    #[test]
    fn test_required_validation() {
        assert!(ConfigValidator::required("blog", Some("key"), "apiKey").is_ok());
        assert!(ConfigValidator::required("blog", Some(""), "apiKey").is_err());

        let err = ConfigValidator::required("blog", None, "apiKey").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration for API 'blog': apiKey is required"
        );
    }

    #[test]
    fn test_url_validation() {
        assert!(ConfigValidator::is_url("blog", "https://example.com", "endpoint").is_ok());
        assert!(ConfigValidator::is_url("blog", "http://example.com", "endpoint").is_ok());
        assert!(ConfigValidator::is_url("blog", "wss://example.com", "endpoint").is_ok());
        assert!(ConfigValidator::is_url("blog", "example.com", "endpoint").is_err());
    }
}
