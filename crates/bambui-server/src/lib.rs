//! bambui backend: accepts wire messages over HTTP and relays them to printers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bambui_bambu::{BambuConfig, BambuError, BambuPrinter, PrinterModel, PrinterStatus};
use bambui_client::Reply;
use bambui_protocol::decode;
use futures::future::join_all;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub mod logging;

/// Shared server state: one session per configured printer.
pub struct AppState {
    printers: BTreeMap<String, Arc<BambuPrinter>>,
}

impl AppState {
    /// State for the given printer registry. No printer is contacted yet.
    pub fn new(configs: BTreeMap<String, BambuConfig>) -> Self {
        let printers = configs
            .into_iter()
            .map(|(name, config)| (name, Arc::new(BambuPrinter::new(config))))
            .collect();
        Self { printers }
    }

    /// Names of the configured printers.
    pub fn printer_names(&self) -> impl Iterator<Item = &str> {
        self.printers.keys().map(String::as_str)
    }
}

/// Printer entry in `GET /api/printers`.
#[derive(Debug, Serialize)]
pub struct PrinterSummary {
    /// Registry name.
    pub name: String,
    /// Printer model.
    pub model: PrinterModel,
    /// Whether the printer answered a reachability check.
    pub is_online: bool,
}

/// Message pushed to a printer websocket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketEvent {
    /// Latest printer status.
    Status(PrinterStatus),
    /// Outcome of a command sent over the socket.
    Reply(Reply),
}

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/printers", get(list_printers))
        .route("/api/printer/:name/command", post(command))
        .route("/api/printer/:name/status", get(printer_status))
        .route("/ws/printer/:name", get(printer_socket))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn list_printers(State(state): State<Arc<AppState>>) -> Json<Vec<PrinterSummary>> {
    let checks = state.printers.iter().map(|(name, printer)| async move {
        PrinterSummary {
            name: name.clone(),
            model: printer.config().model,
            is_online: printer.ping().await,
        }
    });
    Json(join_all(checks).await)
}

fn unknown_printer(name: &str) -> (StatusCode, Json<Reply>) {
    (
        StatusCode::NOT_FOUND,
        Json(Reply::rejected(format!("unknown printer: {name}"))),
    )
}

async fn command(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<Reply>) {
    let Some(printer) = state.printers.get(&name).cloned() else {
        return unknown_printer(&name);
    };

    let (status, reply) = relay(&name, &printer, &body).await;
    (status, Json(reply))
}

async fn printer_status(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let Some(printer) = state.printers.get(&name).cloned() else {
        return unknown_printer(&name).into_response();
    };

    match printer.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            warn!(printer = %name, error = %e, "status unavailable");
            (status_for(&e), Json(Reply::rejected(e.to_string()))).into_response()
        }
    }
}

async fn printer_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let Some(printer) = state.printers.get(&name).cloned() else {
        return unknown_printer(&name).into_response();
    };

    ws.on_upgrade(move |socket| stream_printer(socket, name, printer))
}

/// Push status reports to the socket and relay every message it sends as
/// a command.
async fn stream_printer(socket: WebSocket, name: String, printer: Arc<BambuPrinter>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut outgoing) = mpsc::channel::<SocketEvent>(16);

    let writer = tokio::spawn(async move {
        while let Some(event) = outgoing.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "unserializable socket event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let reports = match printer.subscribe_status().await {
        Ok(status_rx) => Some(tokio::spawn(forward_status(status_rx, tx.clone()))),
        Err(e) => {
            warn!(printer = %name, error = %e, "status stream unavailable");
            let _ = tx
                .send(SocketEvent::Reply(Reply::rejected(e.to_string())))
                .await;
            None
        }
    };

    while let Some(Ok(message)) = stream.next().await {
        let body = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(_) => break,
            _ => continue,
        };
        let (_, reply) = relay(&name, &printer, &body).await;
        if tx.send(SocketEvent::Reply(reply)).await.is_err() {
            break;
        }
    }

    if let Some(reports) = reports {
        reports.abort();
    }
    writer.abort();
    debug!(printer = %name, "socket closed");
}

async fn forward_status(mut rx: watch::Receiver<PrinterStatus>, tx: mpsc::Sender<SocketEvent>) {
    loop {
        let status = rx.borrow_and_update().clone();
        if tx.send(SocketEvent::Status(status)).await.is_err() {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Decode a wire message and execute it on `printer`.
async fn relay(name: &str, printer: &BambuPrinter, body: &[u8]) -> (StatusCode, Reply) {
    let command = match decode(body) {
        Ok(command) => command,
        Err(e) => {
            info!(printer = %name, error = %e, "rejected invalid command");
            return (StatusCode::UNPROCESSABLE_ENTITY, Reply::rejected(e.to_string()));
        }
    };

    let kind = command.kind();
    match printer.execute(&command).await {
        Ok(()) => (StatusCode::OK, Reply::accepted(format!("{kind} sent"))),
        Err(e) => {
            warn!(printer = %name, command = %kind, error = %e, "command failed");
            (status_for(&e), Reply::rejected(e.to_string()))
        }
    }
}

fn status_for(err: &BambuError) -> StatusCode {
    match err {
        BambuError::PrinterBusy { .. } => StatusCode::CONFLICT,
        BambuError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BambuError::ConnectionFailed(_)
        | BambuError::MqttError(_)
        | BambuError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bambui_bambu::parse_printers;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut configs = parse_printers([
            ("BAMBUI_PRINTER.workshop.IP", "127.0.0.1"),
            ("BAMBUI_PRINTER.workshop.ACCESS_CODE", "12345678"),
            ("BAMBUI_PRINTER.workshop.SERIAL", "01S00C000000001"),
            ("BAMBUI_PRINTER.workshop.MODEL", "P1S"),
            ("BAMBUI_PRINTER.shop#2.IP", "127.0.0.1"),
            ("BAMBUI_PRINTER.shop#2.ACCESS_CODE", "87654321"),
            ("BAMBUI_PRINTER.shop#2.SERIAL", "03W00X000000002"),
            ("BAMBUI_PRINTER.shop#2.MODEL", "A1"),
        ])
        .unwrap();
        for config in configs.values_mut() {
            config.timeout = Duration::from_millis(500);
        }
        router(Arc::new(AppState::new(configs)))
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(path: &str) -> (StatusCode, serde_json::Value) {
        send(Request::builder().uri(path).body(Body::empty()).unwrap()).await
    }

    async fn post_command(path: &str, body: &'static str) -> (StatusCode, Reply) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let (status, value) = send(request).await;
        (status, serde_json::from_value(value).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = get_json("/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_list_printers() {
        let (status, printers) = get_json("/api/printers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            printers,
            json!([
                { "name": "shop#2", "model": "A1", "is_online": false },
                { "name": "workshop", "model": "P1S", "is_online": false },
            ])
        );
    }

    #[tokio::test]
    async fn test_unknown_printer() {
        let (status, reply) =
            post_command("/api/printer/attic/command", r#"{"type":"stop_print"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!reply.accepted);

        let (status, body) = get_json("/api/printer/attic/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["accepted"], json!(false));
    }

    #[tokio::test]
    async fn test_invalid_command() {
        let (status, reply) = post_command(
            "/api/printer/workshop/command",
            r#"{"type":"fan_part","speed":150}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(reply.message.unwrap().contains("speed"));

        let (status, _) = post_command("/api/printer/workshop/command", "not json").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_percent_encoded_printer_name() {
        let (status, reply) = post_command(
            "/api/printer/shop%232/command",
            r#"{"type":"move_x","distance":"far"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(reply.message.unwrap().contains("distance"));
    }

    #[tokio::test]
    async fn test_unreachable_printer() {
        let (status, body) = get_json("/api/printer/workshop/status").await;
        assert!(matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        ));
        assert_eq!(body["accepted"], json!(false));

        let (status, reply) = post_command(
            "/api/printer/workshop/command",
            r#"{"type":"upload_file","file":"UEsDBA==","file_name":"benchy.3mf"}"#,
        )
        .await;
        assert!(matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        ));
        assert!(!reply.accepted);
    }

    #[test]
    fn test_socket_events() {
        let reply = serde_json::to_value(SocketEvent::Reply(Reply::accepted("pause_print sent")))
            .unwrap();
        assert_eq!(
            reply,
            json!({ "reply": { "accepted": true, "message": "pause_print sent" } })
        );

        let status = serde_json::to_value(SocketEvent::Status(PrinterStatus::default())).unwrap();
        assert_eq!(status["status"]["state"], json!("Unknown"));
        assert_eq!(status["status"]["bed_temp"], json!(0.0));
    }

    #[test]
    fn test_status_codes() {
        let busy = BambuError::PrinterBusy {
            command: "move_home".into(),
            state: "Printing".into(),
        };
        assert_eq!(status_for(&busy), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&BambuError::UploadFailed("550".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&BambuError::Timeout("status".into())),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
