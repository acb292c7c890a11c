//! Backend endpoint resolution.

use std::env;

/// Environment variable holding the backend address.
pub const BACKEND_URL_VAR: &str = "BAMBUI_BACKEND_URL";

/// Supplies the base address of the backend.
///
/// An empty string means no backend is configured. The address is passed
/// through untouched; the dispatch client does not validate it.
pub trait EndpointResolver: Send + Sync {
    /// Base address, e.g. `http://printers.local:8000`, or empty.
    fn base_url(&self) -> String;
}

/// A fixed backend address.
#[derive(Debug, Clone, Default)]
pub struct StaticEndpoint(pub String);

impl StaticEndpoint {
    /// Resolver always answering `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }
}

impl EndpointResolver for StaticEndpoint {
    fn base_url(&self) -> String {
        self.0.clone()
    }
}

/// Backend address read from the environment at each dispatch.
#[derive(Debug, Clone)]
pub struct EnvEndpoint {
    var: String,
}

impl EnvEndpoint {
    /// Resolver reading [`BACKEND_URL_VAR`].
    pub fn new() -> Self {
        Self::from_var(BACKEND_URL_VAR)
    }

    /// Resolver reading a custom variable.
    pub fn from_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointResolver for EnvEndpoint {
    fn base_url(&self) -> String {
        normalize_base_url(&env::var(&self.var).unwrap_or_default())
    }
}

/// Bare `host:port` values get an `http://` scheme; empty stays empty.
pub fn normalize_base_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        String::new()
    } else if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}
