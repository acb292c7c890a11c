//! Dispatch client.

use bambui_protocol::{encode, ValidCommand, WireMessage};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endpoint::EndpointResolver;
use crate::error::{DispatchError, Result};
use crate::transport::{HttpTransport, Transport, TransportResponse};

/// Reply body exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Whether the backend accepted the command.
    pub accepted: bool,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    /// Accepting reply.
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: Some(message.into()),
        }
    }

    /// Declining reply.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
        }
    }
}

/// Backend confirmation of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// HTTP status of the reply.
    pub status: u16,
    /// Detail from the backend, if any.
    pub message: Option<String>,
}

/// Sends encoded commands for one printer to the backend.
///
/// Each call makes exactly one request; there is no retry. Dropping the
/// returned future cancels the request in flight.
pub struct DispatchClient<R, T = HttpTransport> {
    resolver: R,
    transport: T,
    printer: String,
}

impl<R: EndpointResolver> DispatchClient<R> {
    /// Client using HTTP.
    pub fn new(resolver: R, printer: impl Into<String>) -> Self {
        Self::with_transport(resolver, HttpTransport::new(), printer)
    }
}

impl<R: EndpointResolver, T: Transport> DispatchClient<R, T> {
    /// Client using a custom transport.
    pub fn with_transport(resolver: R, transport: T, printer: impl Into<String>) -> Self {
        Self {
            resolver,
            transport,
            printer: printer.into(),
        }
    }

    /// Target printer name.
    pub fn printer(&self) -> &str {
        &self.printer
    }

    /// URL commands are posted to.
    ///
    /// The printer name is pushed as a single percent-encoded path segment.
    /// An empty or unusable base address is endpoint-unreachable.
    pub fn command_url(&self) -> Result<Url> {
        let base = self.resolver.base_url();
        if base.is_empty() {
            return Err(DispatchError::EndpointUnreachable(
                "no backend address configured".into(),
            ));
        }

        let mut url = Url::parse(&base).map_err(|e| {
            DispatchError::EndpointUnreachable(format!("invalid backend address {base:?}: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                DispatchError::EndpointUnreachable(format!(
                    "backend address {base:?} cannot carry a path"
                ))
            })?
            .pop_if_empty()
            .extend(["api", "printer", self.printer.as_str(), "command"]);
        Ok(url)
    }

    /// Send an encoded command.
    pub async fn dispatch(&self, message: &WireMessage) -> Result<Acknowledgement> {
        let url = self.command_url()?;

        debug!(%url, body = %message, "dispatching command");
        let response = self
            .transport
            .post(url.as_str(), message.as_bytes().to_vec())
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "transport failed");
                DispatchError::from(e)
            })?;

        interpret(response)
    }

    /// Encode and send a validated command.
    pub async fn send(&self, command: &ValidCommand) -> Result<Acknowledgement> {
        self.dispatch(&encode(command)).await
    }
}

fn interpret(response: TransportResponse) -> Result<Acknowledgement> {
    let status = response.status;
    let reply = serde_json::from_slice::<Reply>(&response.body);

    if !(200..300).contains(&status) {
        let reason = reply
            .ok()
            .and_then(|reply| reply.message)
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(&response.body).trim().to_string();
                if text.is_empty() {
                    format!("HTTP {status}")
                } else {
                    text
                }
            });
        return Err(DispatchError::BackendRejected { status, reason });
    }

    match reply {
        Ok(Reply {
            accepted: true,
            message,
        }) => Ok(Acknowledgement { status, message }),
        Ok(Reply {
            accepted: false,
            message,
        }) => Err(DispatchError::BackendRejected {
            status,
            reason: message.unwrap_or_else(|| "declined".into()),
        }),
        Err(e) => Err(DispatchError::MalformedResponse(e.to_string())),
    }
}
