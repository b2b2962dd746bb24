//! Layered error definitions
//!
//! Categorized by source: config / recipient / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Recipient Errors =====
    /// Payload could not be handed to the recipient's transport
    #[error("send to '{recipient}' failed: {message}")]
    RecipientSend { recipient: String, message: String },

    /// Recipient transport is gone
    #[error("recipient '{recipient}' is closed")]
    RecipientClosed { recipient: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create recipient send error
    pub fn recipient_send(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecipientSend {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Create recipient closed error
    pub fn recipient_closed(recipient: impl Into<String>) -> Self {
        Self::RecipientClosed {
            recipient: recipient.into(),
        }
    }
}
