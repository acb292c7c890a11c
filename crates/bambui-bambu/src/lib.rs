#![warn(missing_docs)]

//! Bambu Lab printer integration for the bambui backend.
//!
//! This crate provides:
//! - Translation of catalog commands into firmware payloads
//! - Printer registry configuration from the environment
//! - MQTT communication with Bambu printers
//! - FTPS upload of print files
//! - Status monitoring and idle gating
//!
//! # Example
//!
//! ```ignore
//! use bambui_bambu::{printers_from_env, BambuPrinter};
//! use bambui_protocol::{validate, Candidate};
//!
//! let configs = printers_from_env()?;
//! let printer = BambuPrinter::new(configs["workshop"].clone());
//!
//! let command = validate(&Candidate::new("chamber_light").with("enable", true))?;
//! printer.execute(&command).await?;
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod ftp;
pub mod mqtt;
pub mod status;

pub use commands::PrinterCommand;
pub use config::{parse_printers, printers_from_env, BambuConfig, PrinterModel};
pub use error::{BambuError, ConfigError, Result};
pub use ftp::{FileTransfer, FtpsTransfer};
pub use mqtt::{BambuMqttClient, BambuPrinter};
pub use status::{PrintState, PrinterStatus};
