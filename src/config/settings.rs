//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// SMTP relay settings.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp.server.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "smtp.server must not be empty".to_string(),
            });
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "smtp.port must be non-zero".to_string(),
            });
        }
        if self.smtp.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "smtp.timeout_secs must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// SMTP relay configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// Relay hostname. Default: "smtp.gmail.com"
    #[serde(default = "default_smtp_server")]
    pub server: String,

    /// Relay submission port. Default: 587 (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Per-stage timeout in seconds for the SMTP session.
    /// A timeout in any stage is reported as a connection error.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: default_smtp_server(),
            port: default_smtp_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
