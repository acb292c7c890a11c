#![warn(missing_docs)]

//! Command protocol for bambui printer control.
//!
//! This crate provides:
//! - The closed catalog of printer commands and their parameter domains
//! - Validation of untyped candidates into [`ValidCommand`]s
//! - Canonical JSON wire encoding and decoding
//!
//! # Example
//!
//! ```
//! use bambui_protocol::{encode, validate, Candidate};
//!
//! let candidate = Candidate::new("fan_part").with("speed", 80);
//! let command = validate(&candidate).unwrap();
//! assert_eq!(encode(&command).as_str(), r#"{"speed":80.0,"type":"fan_part"}"#);
//! ```

pub mod catalog;
pub mod error;
pub mod validate;
pub mod wire;

pub use catalog::{Command, CommandKind, Constraint, FieldShape, FieldSpec, SpeedLevel};
pub use error::{DecodeError, Result, ValidationError};
pub use validate::{validate, Candidate, ValidCommand};
pub use wire::{decode, encode, WireMessage, KIND_FIELD};
