//! The JSON-frame protocol and per-connection loop behind the autostart
//! WebSocket (spec.md §4.7).

use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use riptide_core::project::Project;
use riptide_engine::StartStatus;
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::AutostartState;

/// Close code for every rejection path (missing project, permission
/// denied, protocol violation) — spec.md §6 names 1014 as the only close
/// code the proxy ever sends on resolver/connection failure, and reuses it
/// here for the coordinator's own rejections.
const ERR_BAD_GATEWAY: u16 = 1014;

#[derive(Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
enum ClientFrame {
    Register { project: String },
    Start,
}

pub async fn handle(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AutostartState>,
) -> Response {
    let client_ip = client_ipv4(&headers);
    ws.on_upgrade(move |socket| run(socket, state, client_ip))
}

/// The single-route router for the autostart endpoint (spec.md §4.9 route
/// family 3, exact path `/___riptide_proxy_ws`), merged by `riptide-server`
/// into the main application router.
pub fn router(state: AutostartState) -> axum::Router {
    axum::Router::new()
        .route("/___riptide_proxy_ws", axum::routing::get(handle))
        .with_state(state)
}

async fn run(mut socket: WebSocket, state: AutostartState, client_ip: Option<Ipv4Addr>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let subscriber_id = state.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
    let mut registered: Option<Arc<Project>> = None;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match on_frame(&text, &state, client_ip, &mut registered, &tx, subscriber_id).await {
                            FrameOutcome::Continue => {}
                            FrameOutcome::Close(reason) => {
                                let _ = socket
                                    .send(Message::Close(Some(CloseFrame {
                                        code: ERR_BAD_GATEWAY,
                                        reason: reason.into(),
                                    })))
                                    .await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "autostart socket read error");
                        break;
                    }
                }
            }
            Some(broadcast) = rx.recv() => {
                if socket.send(Message::Text(broadcast.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(project) = &registered {
        state.remove_subscriber(&project.name, subscriber_id);
    }
}

enum FrameOutcome {
    Continue,
    Close(String),
}

async fn on_frame(
    text: &str,
    state: &AutostartState,
    client_ip: Option<Ipv4Addr>,
    registered: &mut Option<Arc<Project>>,
    tx: &UnboundedSender<String>,
    subscriber_id: u64,
) -> FrameOutcome {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "malformed autostart frame");
            return FrameOutcome::Close("malformed frame".to_string());
        }
    };

    match frame {
        ClientFrame::Register { project } => {
            on_register(&project, state, client_ip, registered, tx, subscriber_id).await
        }
        ClientFrame::Start => on_start(state, registered).await,
    }
}

async fn on_register(
    project_name: &str,
    state: &AutostartState,
    client_ip: Option<Ipv4Addr>,
    registered: &mut Option<Arc<Project>>,
    tx: &UnboundedSender<String>,
    subscriber_id: u64,
) -> FrameOutcome {
    let project = match state.storage.projects.get_or_load(project_name) {
        riptide_store::Lookup::Found(project) => project,
        riptide_store::Lookup::NotFound | riptide_store::Lookup::LoadError(_) => {
            return FrameOutcome::Close("Project not found.".to_string());
        }
    };

    let allowed = match client_ip {
        Some(ip) => {
            riptide_core::permission::check_permission(ip, state.restrict.as_deref())
        }
        None => {
            tracing::warn!("autostart register: could not determine client ip, denying");
            false
        }
    };

    if !allowed {
        return FrameOutcome::Close("Client not allowed.".to_string());
    }

    state.add_subscriber(&project.name, subscriber_id, tx.clone());
    *registered = Some(project);

    let _ = tx.send(r#"{"status":"ready"}"#.to_string());
    FrameOutcome::Continue
}

async fn on_start(state: &AutostartState, registered: &mut Option<Arc<Project>>) -> FrameOutcome {
    let Some(project) = registered.clone() else {
        return FrameOutcome::Close("Must register before starting.".to_string());
    };

    if state.running.swap(true, Ordering::SeqCst) {
        // Another connection is already driving a start; this one is
        // silently ignored per spec.md §4.7.
        return FrameOutcome::Continue;
    }

    let guard = RunningGuard::new(&state.running);
    run_start(state, &project).await;
    drop(guard);

    FrameOutcome::Continue
}

/// Clears the single-flight `running` flag on every exit path (success,
/// per-service failure, or the stream ending early).
struct RunningGuard<'a> {
    flag: &'a std::sync::atomic::AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn new(flag: &'a std::sync::atomic::AtomicBool) -> Self {
        Self { flag }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

async fn run_start(state: &AutostartState, project: &Project) {
    let services = project.services_to_start();
    let mut stream = state.storage.engine.start_project(project, services).await;
    let mut any_service_errored = false;

    loop {
        let event = match stream.next().await {
            Some(Ok(event)) => event,
            Some(Err(msg)) => {
                // §4.7: "If the stream itself raises, broadcast
                // {"status":"error","msg":"<exc>"} once" — a single
                // terminal frame, no success/failed frame follows.
                let frame = serde_json::json!({"status": "error", "msg": msg});
                state.broadcast(&project.name, &frame.to_string());
                state.metrics.record_autostart_run("error");
                return;
            }
            None => break,
        };

        match &event.status {
            Some(StartStatus::Progress {
                steps,
                current_step,
                text,
            }) if !event.finished => {
                let frame = serde_json::json!({
                    "status": "update",
                    "update": {
                        "service": event.service_name,
                        "status": {
                            "steps": steps,
                            "current_step": current_step,
                            "text": text,
                        }
                    }
                });
                state.broadcast(&project.name, &frame.to_string());
            }
            Some(StartStatus::Error(msg)) if event.finished => {
                any_service_errored = true;
                let frame = serde_json::json!({
                    "status": "update",
                    "update": {
                        "service": event.service_name,
                        "error": msg,
                    }
                });
                state.broadcast(&project.name, &frame.to_string());
            }
            _ if event.finished => {
                let frame = serde_json::json!({
                    "status": "update",
                    "update": {
                        "service": event.service_name,
                        "finished": true,
                    }
                });
                state.broadcast(&project.name, &frame.to_string());
            }
            _ => {}
        }
    }

    let terminal = if any_service_errored {
        r#"{"status":"failed"}"#
    } else {
        r#"{"status":"success"}"#
    };
    state
        .metrics
        .record_autostart_run(if any_service_errored { "failed" } else { "success" });
    state.broadcast(&project.name, terminal);
}

fn client_ipv4(headers: &HeaderMap) -> Option<Ipv4Addr> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    match first.parse::<Ipv4Addr>() {
        Ok(ip) => Some(ip),
        Err(err) => {
            tracing::warn!(value = %first, error = %err, "malformed client address on autostart socket");
            None
        }
    }
}

impl AutostartState {
    fn add_subscriber(&self, project: &str, id: u64, tx: UnboundedSender<String>) {
        self.subscribers
            .entry(project.to_string())
            .or_default()
            .push((id, tx));
    }

    fn remove_subscriber(&self, project: &str, id: u64) {
        if let Some(mut subs) = self.subscribers.get_mut(project) {
            subs.retain(|(existing_id, _)| *existing_id != id);
        }
    }

    /// Best-effort fan-out (spec.md §4.7): dead subscribers are dropped
    /// silently rather than treated as an error.
    fn broadcast(&self, project: &str, message: &str) {
        if let Some(mut subs) = self.subscribers.get_mut(project) {
            subs.retain(|(_, tx)| tx.send(message.to_string()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_engine::memory::MemoryEngine;
    use riptide_store::RuntimeStorage;
    use std::path::PathBuf;

    fn state_with_tmp_projects(dir: &PathBuf) -> AutostartState {
        let engine = Arc::new(MemoryEngine::new());
        let storage = RuntimeStorage::new(vec![dir.clone()], engine, false);
        AutostartState::new(storage, None)
    }

    fn state_with_engine(dir: &PathBuf, engine: Arc<MemoryEngine>) -> AutostartState {
        let storage = RuntimeStorage::new(vec![dir.clone()], engine, false);
        AutostartState::new(storage, None)
    }

    fn tmp_root(suffix: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "riptide-autostart-test-{}-{}",
            std::process::id(),
            suffix
        ));
        std::fs::create_dir_all(&root).ok();
        root
    }

    fn make_project(root: &PathBuf, name: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("riptide.yml"),
            format!("project:\n  name: {name}\n  app:\n    services:\n      web:\n        role: main\n"),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn register_unknown_project_closes_not_found() {
        let root = tmp_root("unknown");
        let state = state_with_tmp_projects(&root);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registered = None;
        let outcome = on_register("nope", &state, Some("127.0.0.1".parse().unwrap()), &mut registered, &tx, 0).await;
        assert!(matches!(outcome, FrameOutcome::Close(reason) if reason == "Project not found."));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn register_known_project_replies_ready() {
        let root = tmp_root("known");
        make_project(&root, "demo");
        let state = state_with_tmp_projects(&root);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registered = None;
        let outcome = on_register("demo", &state, Some("127.0.0.1".parse().unwrap()), &mut registered, &tx, 0).await;
        assert!(matches!(outcome, FrameOutcome::Continue));
        assert!(registered.is_some());
        assert_eq!(rx.recv().await.unwrap(), r#"{"status":"ready"}"#);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn register_denied_by_permission_gate_closes() {
        let root = tmp_root("denied");
        make_project(&root, "demo");
        let mut state = state_with_tmp_projects(&root);
        state.restrict = Some(vec!["10.0.0.0/8".to_string()]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registered = None;
        let outcome = on_register("demo", &state, Some("8.8.8.8".parse().unwrap()), &mut registered, &tx, 0).await;
        assert!(matches!(outcome, FrameOutcome::Close(reason) if reason == "Client not allowed."));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn start_without_register_is_rejected() {
        let root = tmp_root("no-register");
        let state = state_with_tmp_projects(&root);
        let mut registered = None;
        let outcome = on_start(&state, &mut registered).await;
        assert!(matches!(outcome, FrameOutcome::Close(reason) if reason == "Must register before starting."));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn concurrent_start_is_ignored_while_running() {
        let root = tmp_root("concurrent");
        let state = state_with_tmp_projects(&root);
        state.running.store(true, Ordering::SeqCst);
        let project = Arc::new(Project {
            name: "demo".to_string(),
            app: Default::default(),
            default_services: None,
        });
        let mut registered = Some(project);
        let outcome = on_start(&state, &mut registered).await;
        assert!(matches!(outcome, FrameOutcome::Continue));
        assert!(state.running.load(Ordering::SeqCst));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn run_start_broadcasts_error_frame_when_stream_raises() {
        let root = tmp_root("stream-error");
        make_project(&root, "demo");
        let engine = Arc::new(MemoryEngine::new());
        engine.seed_stream_error("demo", "engine connection lost");
        let state = state_with_engine(&root, engine);
        let project = Project {
            name: "demo".to_string(),
            app: Default::default(),
            default_services: None,
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.add_subscriber("demo", 0, tx);

        run_start(&state, &project).await;

        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"msg":"engine connection lost","status":"error"}"#
        );
        // No success/failed terminal frame follows a stream-level error.
        drop(state);
        assert!(rx.recv().await.is_none());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn client_ipv4_parses_first_forwarded_for_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ipv4(&headers), Some("203.0.113.5".parse().unwrap()));
    }

    #[test]
    fn client_ipv4_none_when_header_missing() {
        let headers = HeaderMap::new();
        assert_eq!(client_ipv4(&headers), None);
    }
}
