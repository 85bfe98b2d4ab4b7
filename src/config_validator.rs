//! Configuration Validation
//!
//! Validates the loaded configuration at startup. Every violation is
//! collected so the operator sees all of them at once.

use std::path::Path;

/// Configuration validation errors
#[derive(Debug)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of config validation
pub type ConfigResult<T> = Result<T, Vec<ConfigValidationError>>;

/// Configuration validator
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn error(&mut self, field: &str, value: impl std::fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    /// Validate port number (1-65535)
    pub fn validate_port(&mut self, field: &str, port: u16) -> &mut Self {
        if port == 0 {
            self.error(field, port, "Port must be between 1 and 65535");
        }
        self
    }

    /// Validate timeout in seconds
    pub fn validate_timeout_secs(&mut self, field: &str, secs: u64, max_secs: u64) -> &mut Self {
        if secs == 0 || secs > max_secs {
            self.error(
                field,
                format!("{}s", secs),
                &format!("Timeout must be between 1s and {}s", max_secs),
            );
        }
        self
    }

    /// Validate non-empty string
    pub fn validate_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, value, "Value cannot be empty");
        }
        self
    }

    /// Validate a relative directory name on the storage disk.
    ///
    /// Segments must be non-empty and may not be `.` or `..`.
    pub fn validate_relative_dir(&mut self, field: &str, value: &str) -> &mut Self {
        let trimmed = value.trim_matches('/');
        let unsafe_segment = trimmed
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == ".." || s.contains('\\'));
        if trimmed.is_empty() || unsafe_segment || value.starts_with('/') {
            self.error(field, value, "Must be a relative directory without '.' or '..' segments");
        }
        self
    }

    /// Validate public URL: absolute http(s) or a path starting with `/`
    pub fn validate_public_url(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.starts_with('/') && !value.starts_with("http://") && !value.starts_with("https://") {
            self.error(field, value, "URL must start with /, http:// or https://");
        }
        self
    }

    /// Validate path is directory
    pub fn validate_is_directory(&mut self, field: &str, path: &Path) -> &mut Self {
        if path.exists() && !path.is_dir() {
            self.error(field, path.display(), "Path is not a directory");
        }
        self
    }

    /// Validate path is writable
    pub fn validate_writable(&mut self, field: &str, path: &Path) -> &mut Self {
        if path.is_dir() {
            let test_file = path.join(".dumpvault_write_test");
            match std::fs::write(&test_file, "test") {
                Ok(_) => {
                    let _ = std::fs::remove_file(&test_file);
                }
                Err(_) => {
                    self.error(field, path.display(), "Path is not writable");
                }
            }
        }
        self
    }

    /// Finish validation and return result
    pub fn finish(self) -> ConfigResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Format validation errors for display
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
