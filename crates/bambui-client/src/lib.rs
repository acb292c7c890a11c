#![warn(missing_docs)]

//! Dispatch client for bambui printer commands.
//!
//! This crate provides:
//! - Backend address resolution (static or from the environment)
//! - A transport seam with an HTTP implementation
//! - The dispatch client, classifying failures as unreachable, rejected or malformed
//!
//! # Example
//!
//! ```ignore
//! use bambui_client::{DispatchClient, EnvEndpoint};
//! use bambui_protocol::{validate, Candidate};
//!
//! let command = validate(&Candidate::new("pause_print"))?;
//! let client = DispatchClient::new(EnvEndpoint::new(), "workshop");
//! let ack = client.send(&command).await?;
//! ```

pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod transport;

pub use dispatch::{Acknowledgement, DispatchClient, Reply};
pub use endpoint::{normalize_base_url, EndpointResolver, EnvEndpoint, StaticEndpoint, BACKEND_URL_VAR};
pub use error::{DispatchError, Result, TransportError};
pub use transport::{HttpTransport, Transport, TransportResponse};
