//! Logging initialization.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "bambui_server=info,bambui_bambu=info,bambui_client=info";

static INIT_ONCE: Once = Once::new();

/// Install the global tracing subscriber. Later calls are no-ops.
///
/// `json` switches to structured JSON lines for log collectors.
pub fn init(json: bool) {
    INIT_ONCE.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if json {
            builder.json().init();
        } else {
            builder.init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(false);
        init(false);
        init(true);
    }
}
