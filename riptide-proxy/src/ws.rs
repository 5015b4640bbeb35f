//! §4.6 WebSocket Reverse-Proxy Handler — entry point for any non-autostart
//! path carrying `Upgrade: websocket`. Resolves exactly like the HTTP
//! handler, then relays frames bidirectionally between the client and the
//! resolved upstream.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TungsteniteCloseFrame;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use crate::resolver::{self, ResolveStatus};
use crate::AppState;

/// Close code the proxy sends when the resolver doesn't produce SUCCESS,
/// or when opening the upstream connection fails (spec.md §4.6 step 1,
/// §6 "ERR_BAD_GATEWAY").
const ERR_BAD_GATEWAY: u16 = 1014;

pub async fn handle(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    uri: Uri,
    State(state): State<AppState>,
) -> Response {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let requested_protocol = headers
        .get(axum::http::header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string());

    let status = resolver::resolve(
        &state.storage,
        &host,
        &state.base_url,
        state.autostart_enabled,
    )
    .await;

    let mut ws = ws;
    if let Some(proto) = &requested_protocol {
        ws = ws.protocols([proto.clone()]);
    }

    match status {
        ResolveStatus::Success { upstream_url, .. } => {
            let target = format!(
                "{}{}",
                to_ws_scheme(&upstream_url),
                uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
            );
            ws.on_upgrade(move |socket| relay(socket, target, requested_protocol))
        }
        other => {
            let reason = reason_for(&other);
            ws.on_upgrade(move |mut socket| async move {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: ERR_BAD_GATEWAY,
                        reason: reason.into(),
                    })))
                    .await;
            })
        }
    }
}

fn reason_for(status: &ResolveStatus) -> String {
    match status {
        ResolveStatus::NoProject => "no project requested".to_string(),
        ResolveStatus::ProjectNotFound { project_name } => {
            format!("project not found: {project_name}")
        }
        ResolveStatus::ProjectLoadError { project_name, .. } => {
            format!("project failed to load: {project_name}")
        }
        ResolveStatus::NoMainService { project, .. } => {
            format!("{} has no main service", project.name)
        }
        ResolveStatus::ServiceNotFound {
            project,
            requested_service,
        } => format!("{} has no service {}", project.name, requested_service),
        ResolveStatus::NotStarted { project, resolved_service }
        | ResolveStatus::NotStartedAutostart { project, resolved_service } => {
            format!("{}--{} is not running", project.name, resolved_service)
        }
        ResolveStatus::Success { .. } => unreachable!(),
    }
}

fn to_ws_scheme(upstream_url: &str) -> String {
    if let Some(rest) = upstream_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = upstream_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        upstream_url.to_string()
    }
}

async fn relay(client: WebSocket, target: String, subprotocol: Option<String>) {
    let connect_result = if let Some(proto) = &subprotocol {
        let request = tokio_tungstenite::tungstenite::handshake::client::Request::builder()
            .uri(&target)
            .header("sec-websocket-protocol", proto.as_str())
            .body(())
            .expect("valid upstream websocket request");
        tokio_tungstenite::connect_async(request).await
    } else {
        tokio_tungstenite::connect_async(&target).await
    };

    let (upstream, _response) = match connect_result {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(target = %target, error = %err, "failed to open upstream websocket");
            let mut client = client;
            let _ = client
                .send(Message::Close(Some(CloseFrame {
                    code: ERR_BAD_GATEWAY,
                    reason: "upstream websocket unreachable".into(),
                })))
                .await;
            return;
        }
    };

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    // §4.6 step 4: client -> upstream.
    let client_to_upstream = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let close = matches!(msg, Message::Close(_));
            if upstream_tx.send(to_tungstenite(msg)).await.is_err() || close {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    // upstream -> client.
    let upstream_to_client = async {
        while let Some(Ok(msg)) = upstream_rx.next().await {
            let close = matches!(msg, TungsteniteMessage::Close(_));
            if client_tx.send(to_axum(msg)).await.is_err() || close {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }
}

fn to_tungstenite(msg: Message) -> TungsteniteMessage {
    match msg {
        Message::Text(text) => TungsteniteMessage::Text(text.as_str().into()),
        Message::Binary(data) => TungsteniteMessage::Binary(data),
        Message::Ping(data) => TungsteniteMessage::Ping(data),
        Message::Pong(data) => TungsteniteMessage::Pong(data),
        Message::Close(frame) => TungsteniteMessage::Close(frame.map(|f| TungsteniteCloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        })),
    }
}

fn to_axum(msg: TungsteniteMessage) -> Message {
    match msg {
        TungsteniteMessage::Text(text) => Message::Text(text.as_str().into()),
        TungsteniteMessage::Binary(data) => Message::Binary(data),
        TungsteniteMessage::Ping(data) => Message::Ping(data),
        TungsteniteMessage::Pong(data) => Message::Pong(data),
        TungsteniteMessage::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        })),
        TungsteniteMessage::Frame(_) => Message::Ping(Vec::new().into()),
    }
}

/// Any non-autostart path carrying an `Upgrade: websocket` header routes
/// here (spec.md §4.9 route family 2).
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}
