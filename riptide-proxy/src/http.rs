//! §4.5 HTTP Reverse-Proxy Handler — drives the Resolver, forwards the
//! request to the resolved upstream, and maps resolver/upstream outcomes
//! to the status-code table in spec.md §4.5 step 1 and §7.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;

use crate::pages::StatusPage;
use crate::resolver::{self, ResolveStatus};
use crate::AppState;

/// Connect timeout for the upstream HTTP request (spec.md §4.5 step 2).
pub const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Full request timeout, connect included (spec.md §4.5 step 2).
pub const UPSTREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cap on buffered request bodies. Buffering (rather than streaming) is
/// what makes the cache-flush retry (§4.5 step 4) able to resend the same
/// body bytes against the freshly-resolved upstream.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

const HOP_BY_HOP_RESPONSE_HEADERS: [&str; 4] = [
    "content-length",
    "transfer-encoding",
    "content-encoding",
    "connection",
];

/// Armed on resolver SUCCESS, disarmed once a response (or terminal error)
/// is produced. If the enclosing future is dropped while armed — the
/// client closed the connection before the upstream replied — logs the
/// 499 pseudo-status on `Drop`; this is the only place 499 is observable,
/// matching spec.md §4.5 step 5 ("no bytes go to the closed client").
struct CancelGuard {
    armed: bool,
    project: String,
    service: String,
}

impl CancelGuard {
    fn new(project: &str, service: &str) -> Self {
        Self {
            armed: true,
            project: project.to_string(),
            service: service.to_string(),
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!(
                status = 499,
                project = %self.project,
                service = %self.service,
                "client closed request before upstream responded"
            );
        }
    }
}

/// The single handler backing GET/HEAD/POST/DELETE/PATCH/PUT/OPTIONS
/// (spec.md §4.5: "all share a single implementation").
pub async fn handle(State(state): State<AppState>, req: Request<Body>) -> Response {
    let started_at = std::time::Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let host = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let peer_ip = client_ip(req.headers());
    let scheme = if req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        == Some("https")
    {
        "https".to_string()
    } else {
        "http".to_string()
    };

    let (parts, body) = req.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .unwrap_or_default();

    let response = handle_with_retry(
        &state,
        &parts.method,
        &parts.uri,
        &parts.headers,
        body_bytes,
        &host,
        &peer_ip,
        &scheme,
        false,
    )
    .await;

    let latency = started_at.elapsed();
    let outcome = response.status().as_u16().to_string();
    state.metrics.record_request(&outcome, latency.as_secs_f64());
    riptide_observability::access_log::log(&riptide_observability::access_log::AccessLogEntry {
        route_id: host,
        client_ip: peer_ip,
        method: method.to_string(),
        uri: uri.to_string(),
        response_status: response.status().as_u16(),
        latency_ms: latency.as_secs_f64() * 1000.0,
        upstream_addr: None,
    });

    response
}

#[allow(clippy::too_many_arguments)]
async fn handle_with_retry(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    host: &str,
    peer_ip: &str,
    scheme: &str,
    retried: bool,
) -> Response {
    let status = resolver::resolve(
        &state.storage,
        host,
        &state.base_url,
        state.autostart_enabled,
    )
    .await;

    match status {
        ResolveStatus::NoProject => render_landing(state).await,
        ResolveStatus::ProjectNotFound { project_name } => {
            StatusPage::ProjectNotFound { project_name }.into_response()
        }
        ResolveStatus::NoMainService { project, .. } => StatusPage::NoMainService {
            project_name: project.name.clone(),
        }
        .into_response(),
        ResolveStatus::ServiceNotFound {
            project,
            requested_service,
        } => StatusPage::ServiceNotFound {
            project_name: project.name.clone(),
            service_name: requested_service,
        }
        .into_response(),
        ResolveStatus::NotStarted {
            project,
            resolved_service,
        } => StatusPage::NotStarted {
            project_name: project.name.clone(),
            service_name: resolved_service,
        }
        .into_response(),
        ResolveStatus::NotStartedAutostart {
            project,
            resolved_service,
        } => StatusPage::StartProject {
            project_name: project.name.clone(),
            service_name: resolved_service,
        }
        .into_response(),
        ResolveStatus::ProjectLoadError {
            project_name,
            error,
        } => {
            let causes = riptide_core::error::format_cause_chain(error.as_ref().as_ref());
            StatusPage::InternalErrorProjectLoad {
                project_name,
                causes,
            }
            .into_response()
        }
        ResolveStatus::Success {
            project,
            resolved_service,
            upstream_url,
        } => {
            let mut guard = CancelGuard::new(&project.name, &resolved_service);
            let outcome = forward(
                state,
                method,
                uri,
                headers,
                body.clone(),
                &upstream_url,
                peer_ip,
                scheme,
            )
            .await;
            guard.disarm();

            match outcome {
                Ok(response) => response,
                Err(ForwardError::Timeout) => StatusPage::GatewayTimeout {
                    project_name: project.name.clone(),
                    service_name: resolved_service,
                }
                .into_response(),
                Err(ForwardError::BadResponse) => StatusPage::BadGateway {
                    project_name: project.name.clone(),
                    service_name: resolved_service,
                }
                .into_response(),
                Err(ForwardError::Unreachable) if !retried => {
                    // §4.5 step 4 / I3: flush both caches and re-drive the
                    // resolver exactly once (P4).
                    state.storage.flush_caches();
                    Box::pin(handle_with_retry(
                        state, method, uri, headers, body, host, peer_ip, scheme, true,
                    ))
                    .await
                }
                Err(ForwardError::Unreachable) => {
                    let causes =
                        vec!["upstream unreachable after cache-flush retry".to_string()];
                    StatusPage::InternalError {
                        project_name: project.name.clone(),
                        service_name: resolved_service,
                        causes,
                    }
                    .into_response()
                }
            }
        }
    }
}

async fn render_landing(state: &AppState) -> Response {
    let (found, failed) = state.storage.projects.get_all();
    let mut projects: Vec<String> = found.into_iter().map(|p| p.name.clone()).collect();
    projects.sort();

    let mut load_errors: Vec<(String, Vec<String>)> = failed
        .into_iter()
        .map(|(name, err)| (name, riptide_core::error::format_cause_chain(err.as_ref())))
        .collect();
    load_errors.sort_by(|a, b| a.0.cmp(&b.0));

    StatusPage::Landing {
        base_url: state.base_url.clone(),
        projects,
        load_errors,
    }
    .into_response()
}

enum ForwardError {
    Timeout,
    BadResponse,
    Unreachable,
}

#[allow(clippy::too_many_arguments)]
async fn forward(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    upstream_url: &str,
    peer_ip: &str,
    scheme: &str,
) -> Result<Response, ForwardError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = format!("{upstream_url}{path_and_query}");

    let mut out_headers = headers.clone();
    out_headers.insert(
        HeaderName::from_static("x-real-ip"),
        HeaderValue::from_str(peer_ip).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    out_headers.insert(
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_str(peer_ip).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    out_headers.insert(
        HeaderName::from_static("x-forwarded-proto"),
        HeaderValue::from_str(scheme).unwrap_or_else(|_| HeaderValue::from_static("http")),
    );
    out_headers.insert(
        HeaderName::from_static("x-scheme"),
        HeaderValue::from_str(scheme).unwrap_or_else(|_| HeaderValue::from_static("http")),
    );

    let mut request = state
        .http_client
        .request(method.clone(), &url)
        .headers(out_headers)
        .timeout(UPSTREAM_REQUEST_TIMEOUT);

    // §4.5 step 2: empty body is forwarded as no body, not a zero-length
    // one — a GET must not pick up `Content-Length: 0`.
    if !body.is_empty() {
        request = request.body(body);
    }

    let response = request.send().await.map_err(classify_error)?;

    Ok(forward_response(response))
}

fn classify_error(err: reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout
    } else if err.is_connect() {
        ForwardError::Unreachable
    } else if err.is_decode() || err.is_request() {
        ForwardError::BadResponse
    } else {
        ForwardError::Unreachable
    }
}

/// §4.5 step 3: copy status + every header except the four the transport
/// layer recomputes or that are connection-scoped, add `X-Forwarded-By`.
fn forward_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if HOP_BY_HOP_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(
        HeaderName::from_static("x-forwarded-by"),
        HeaderValue::from_static("riptide proxy"),
    );

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    let body = Body::from_stream(stream);

    let mut response = Response::builder().status(status).body(body).unwrap();
    *response.headers_mut() = headers;
    response
}

/// Best-effort client IP, honoring `X-Forwarded-For` when present (the
/// proxy "honors X-Forwarded-* headers on incoming requests", spec.md
/// §4.9), falling back to a placeholder when neither is available (e.g.
/// behind a Unix socket, or in tests).
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    "127.0.0.1".to_string()
}
