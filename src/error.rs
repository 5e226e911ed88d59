//! Error types for gmail-send-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include credentials.
//! Relay faults are demoted to the `details` field of an
//! [`ErrorDescriptor`]; the primary message is always a stable,
//! user-safe string.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while assembling the skill registry at startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A skill with the same name is already registered.
    #[error("skill already registered: {name}")]
    DuplicateSkill {
        /// The conflicting skill name.
        name: String,
    },

    /// Two skills declare the same resource URI.
    #[error("duplicate resource URI: {uri}")]
    DuplicateResourceUri {
        /// The conflicting resource URI.
        uri: String,
    },
}

/// Classification of a failed skill invocation.
///
/// Kinds are mutually exclusive and assigned by the stage that detects
/// the fault. Serialised in `snake_case` on the wire (the `type` field
/// of an error payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied parameters failed schema or semantic checks.
    /// Detected before any network activity.
    ValidationError,
    /// The relay rejected the supplied credentials.
    AuthenticationError,
    /// The relay rejected the destination address.
    RecipientError,
    /// Network failure or timeout establishing or maintaining the session.
    ConnectionError,
    /// Any other failure (unexpected internal fault).
    ExecutionError,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::AuthenticationError => "authentication_error",
            Self::RecipientError => "recipient_error",
            Self::ConnectionError => "connection_error",
            Self::ExecutionError => "execution_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured skill failure: stable message, kind, optional diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDescriptor {
    /// Stable, user-safe description of the failure.
    pub message: String,

    /// Failure classification.
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    /// Low-level fault text, preserved for diagnostics only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDescriptor {
    /// Creates a new error descriptor without diagnostic details.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            details: None,
        }
    }

    /// Attaches low-level diagnostic text.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
