//! Error types for the command protocol.

use thiserror::Error;

use crate::catalog::{CommandKind, Constraint};

/// A candidate command that violates the catalog.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No discriminant present.
    #[error("command has no \"type\" field")]
    MissingKind,

    /// Discriminant is not a catalog entry.
    #[error("unknown command kind: {0}")]
    UnknownKind(String),

    /// Field not declared for this kind.
    #[error("{kind} does not take field {field:?}")]
    UnexpectedField {
        /// Command kind.
        kind: CommandKind,
        /// Offending field.
        field: String,
    },

    /// Declared field absent.
    #[error("{kind} requires field {field:?}")]
    MissingField {
        /// Command kind.
        kind: CommandKind,
        /// Missing field.
        field: String,
    },

    /// Field holds the wrong JSON type.
    #[error("field {field:?} must be a {expected}")]
    WrongType {
        /// Offending field.
        field: String,
        /// Expected JSON type.
        expected: &'static str,
    },

    /// Field value outside its domain.
    #[error("field {field:?} {constraint}")]
    OutOfDomain {
        /// Offending field.
        field: String,
        /// Violated constraint.
        constraint: Constraint,
    },
}

impl ValidationError {
    /// Name of the offending field, if the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingKind | ValidationError::UnknownKind(_) => None,
            ValidationError::UnexpectedField { field, .. }
            | ValidationError::MissingField { field, .. }
            | ValidationError::WrongType { field, .. }
            | ValidationError::OutOfDomain { field, .. } => Some(field),
        }
    }
}

/// Errors turning wire bytes back into a command.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Bytes are not JSON.
    #[error("wire message is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON is not an object.
    #[error("wire message is not a JSON object")]
    NotAnObject,

    /// Object does not describe a valid command.
    #[error("invalid command: {0}")]
    Invalid(#[from] ValidationError),
}

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
