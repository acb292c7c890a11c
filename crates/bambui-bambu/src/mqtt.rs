//! MQTT client for Bambu printers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bambui_protocol::{Command, ValidCommand};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use tokio::net::TcpStream;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::PrinterCommand;
use crate::config::BambuConfig;
use crate::error::{BambuError, Result};
use crate::ftp::{FileTransfer, FtpsTransfer};
use crate::status::{PrintState, PrinterStatus};

/// MQTT broker port on the printer.
pub const MQTT_PORT: u16 = 8883;
/// MQTT user for LAN mode.
pub const MQTT_USER: &str = "bblp";
/// Upper bound on a reachability check.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT client for Bambu printer communication.
///
/// A background task drives the MQTT event loop and folds every report
/// into the latest [`PrinterStatus`].
pub struct BambuMqttClient {
    config: BambuConfig,
    client: AsyncClient,
    status_rx: watch::Receiver<PrinterStatus>,
    driver: JoinHandle<()>,
}

impl BambuMqttClient {
    /// Connect to a Bambu printer.
    pub async fn connect(config: BambuConfig) -> Result<Self> {
        let client_id = format!("bambui_{}", uuid::Uuid::new_v4());

        let mut mqtt_options = MqttOptions::new(&client_id, config.ip.to_string(), MQTT_PORT);
        mqtt_options.set_credentials(MQTT_USER, &config.access_code);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        mqtt_options.set_clean_session(true);

        // Bambu uses self-signed certificates
        let tls_config = TlsConfiguration::Simple {
            ca: vec![],
            alpn: None,
            client_auth: None,
        };
        mqtt_options.set_transport(Transport::tls_with_config(tls_config));

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, 100);
        wait_for_connection(&mut event_loop, config.timeout).await?;
        info!(printer = %config.name, ip = %config.ip, "connected to printer");

        let report_topic = format!("device/{}/report", config.serial);
        client
            .subscribe(&report_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BambuError::MqttError(e.to_string()))?;

        let (status_tx, status_rx) = watch::channel(PrinterStatus::default());
        let driver = tokio::spawn(drive(event_loop, status_tx, config.name.clone()));

        Ok(Self {
            config,
            client,
            status_rx,
            driver,
        })
    }

    /// Send a command to the printer.
    pub async fn send_command(&self, command: PrinterCommand) -> Result<()> {
        let topic = format!("device/{}/request", self.config.serial);
        let payload = command.to_json().to_string();
        debug!(printer = %self.config.name, %topic, %payload, "publishing");

        self.client
            .publish(&topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| BambuError::MqttError(e.to_string()))?;

        Ok(())
    }

    /// Request a full status push from the printer.
    pub async fn request_status(&self) -> Result<()> {
        self.send_command(PrinterCommand::PushAll).await
    }

    /// Subscribe to status updates.
    pub fn subscribe_status(&self) -> watch::Receiver<PrinterStatus> {
        self.status_rx.clone()
    }

    /// Get the printer serial number.
    pub fn serial(&self) -> &str {
        &self.config.serial
    }
}

impl Drop for BambuMqttClient {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn wait_for_connection(event_loop: &mut EventLoop, timeout: Duration) -> Result<()> {
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(BambuError::Timeout("connection timeout".into()));
        }

        match tokio::time::timeout(Duration::from_millis(500), event_loop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => return Ok(()),
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => return Err(BambuError::ConnectionFailed(e.to_string())),
            Err(_) => continue,
        }
    }
}

async fn drive(mut event_loop: EventLoop, status_tx: watch::Sender<PrinterStatus>, name: String) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic.ends_with("/report") => {
                match serde_json::from_slice::<serde_json::Value>(&publish.payload) {
                    Ok(payload) => status_tx.send_modify(|status| status.apply(&payload)),
                    Err(e) => debug!(printer = %name, error = %e, "ignoring unparsable report"),
                }
            }
            Ok(_) => {}
            Err(e) => {
                // The next poll reconnects.
                warn!(printer = %name, error = %e, "MQTT connection error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// High-level printer session, connected on first use.
pub struct BambuPrinter {
    config: BambuConfig,
    client: OnceCell<BambuMqttClient>,
    transfer: Arc<dyn FileTransfer>,
}

impl BambuPrinter {
    /// Session for a configured printer. Nothing is connected yet.
    pub fn new(config: BambuConfig) -> Self {
        Self::with_transfer(config, FtpsTransfer)
    }

    /// Session uploading print files through `transfer`.
    pub fn with_transfer(config: BambuConfig, transfer: impl FileTransfer + 'static) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            transfer: Arc::new(transfer),
        }
    }

    /// Printer configuration.
    pub fn config(&self) -> &BambuConfig {
        &self.config
    }

    async fn client(&self) -> Result<&BambuMqttClient> {
        self.client
            .get_or_try_init(|| BambuMqttClient::connect(self.config.clone()))
            .await
    }

    /// Whether the printer accepts connections on its MQTT port.
    pub async fn ping(&self) -> bool {
        let addr = SocketAddr::new(self.config.ip, MQTT_PORT);
        let wait = self.config.timeout.min(PING_TIMEOUT);
        matches!(
            tokio::time::timeout(wait, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }

    /// Latest printer status, asking for a full push if none is known yet.
    pub async fn status(&self) -> Result<PrinterStatus> {
        let client = self.client().await?;
        let mut rx = client.subscribe_status();
        if rx.borrow().state != PrintState::Unknown {
            return Ok(rx.borrow().clone());
        }

        client.request_status().await?;
        let wait = async {
            loop {
                let known = rx.borrow_and_update().state != PrintState::Unknown;
                if known || rx.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::time::timeout(self.config.timeout, wait)
            .await
            .map_err(|_| BambuError::Timeout("status request timed out".into()))?;

        let status = rx.borrow().clone();
        Ok(status)
    }

    /// Stream of status updates. A full push is requested so the stream
    /// starts from a complete report.
    pub async fn subscribe_status(&self) -> Result<watch::Receiver<PrinterStatus>> {
        let client = self.client().await?;
        client.request_status().await?;
        Ok(client.subscribe_status())
    }

    /// Forward a validated command to the printer.
    ///
    /// Commands that move the toolhead or feed filament are refused unless
    /// the printer reports itself idle. Uploads are transferred before the
    /// print is started.
    pub async fn execute(&self, command: &ValidCommand) -> Result<()> {
        let kind = command.kind();
        let client = self.client().await?;
        if kind.requires_idle() {
            let status = self.status().await?;
            if !status.state.is_idle() {
                return Err(BambuError::PrinterBusy {
                    command: kind.to_string(),
                    state: format!("{:?}", status.state),
                });
            }
        }

        let firmware = self.prepare(command.command()).await?;
        info!(printer = %self.config.name, command = %kind, "executing");
        client.send_command(firmware).await
    }

    /// Do the work a command needs off the MQTT channel and return the
    /// firmware command to publish.
    async fn prepare(&self, command: &Command) -> Result<PrinterCommand> {
        if let Command::UploadFile { file_name, .. } = command {
            let bytes = command.file_bytes().unwrap_or_default();
            debug!(
                printer = %self.config.name,
                file = %file_name,
                len = bytes.len(),
                "uploading"
            );
            self.transfer.upload(&self.config, file_name, &bytes).await?;
        }
        Ok(PrinterCommand::from(command))
    }
}
