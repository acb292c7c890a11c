//! bambui-server - relays printer commands from clients to Bambu printers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bambui_bambu::printers_from_env;
use bambui_server::{logging, router, AppState};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bambui-server")]
#[command(about = "Relay bambui printer commands to Bambu printers", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BAMBUI_LISTEN", default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// Emit JSON log lines
    #[arg(long, env = "BAMBUI_LOG_JSON")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs);

    let printers = printers_from_env().context("reading printer registry")?;
    let state = Arc::new(AppState::new(printers));
    let names: Vec<&str> = state.printer_names().collect();
    if names.is_empty() {
        warn!("no printers configured; set BAMBUI_PRINTER.<name>.<IP|ACCESS_CODE|SERIAL|MODEL>");
    } else {
        info!(printers = %names.join(","), "loaded printer registry");
    }

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(addr = %cli.listen, "listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
