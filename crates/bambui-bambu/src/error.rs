//! Error types for Bambu integration.

use thiserror::Error;

/// Errors from Bambu printer operations.
#[derive(Error, Debug)]
pub enum BambuError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// MQTT error.
    #[error("MQTT error: {0}")]
    MqttError(String),

    /// Command needs an idle printer.
    #[error("printer is busy ({state}); {command} needs an idle printer")]
    PrinterBusy {
        /// Command that was refused.
        command: String,
        /// State the printer reported.
        state: String,
    },

    /// File transfer to the printer SD card failed.
    #[error("file upload failed: {0}")]
    UploadFailed(String),

    /// Timeout error.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Errors in the printer registry configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A printer lacks a required attribute.
    #[error("printer {printer} is missing {attribute}")]
    MissingAttribute {
        /// Printer name.
        printer: String,
        /// Attribute name.
        attribute: &'static str,
    },

    /// IP attribute does not parse.
    #[error("invalid printer IP address: {0}")]
    InvalidIp(String),

    /// Model attribute is not supported.
    #[error("unsupported printer model: {0}")]
    UnknownModel(String),
}

/// Result type for Bambu operations.
pub type Result<T> = std::result::Result<T, BambuError>;
