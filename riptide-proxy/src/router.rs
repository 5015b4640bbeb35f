//! §4.9 Router / Server — mounts the non-autostart route families (the
//! autostart WebSocket itself lives in `riptide-autostart` and is merged
//! in by `riptide-server`, since it carries its own state) plus an
//! ambient `/healthz` liveness probe and any registered sub-hostname
//! routes (spec.md §4.9 "optional sub-hostnames").

use axum::extract::{Request, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;

use crate::subroutes::SubrouteProvider;
use crate::{http, ws, AppState};

/// Family 1 (plain HTTP) and family 2 (WebSocket upgrade) are both
/// reached through this single fallback: everything except the exact
/// `/___riptide_proxy_ws` path, which `riptide-server` routes directly to
/// the autostart coordinator before this fallback is ever consulted.
async fn universal_handler(State(state): State<AppState>, req: Request) -> Response {
    if ws::is_websocket_upgrade(req.headers()) {
        let (mut parts, _body) = req.into_parts();
        match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => ws::handle(upgrade, parts.headers, parts.uri, State(state)).await,
            Err(rejection) => rejection.into_response(),
        }
    } else {
        http::handle(State(state), req).await
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> String {
    riptide_observability::prometheus_exporter::render_metrics(&state.metrics)
}

/// Builds the application router for the non-autostart route families,
/// merging in any registered [`SubrouteProvider`]s.
pub fn build_router(state: AppState, subroutes: Vec<Box<dyn SubrouteProvider>>) -> Router {
    let use_compression = state.storage.use_compression;

    let mut app: Router<AppState> = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .fallback(universal_handler);

    for provider in &subroutes {
        tracing::info!(
            subdomain = %provider.subdomain(),
            base_url = %state.base_url,
            "mounting sub-hostname routes"
        );
        app = app.merge(provider.routes());
    }

    let app = app.with_state(state);

    // spec.md §3 `use_compression`: gzip the proxy's own response to the
    // client when enabled. Upstream bodies always arrive decompressed
    // (see `AppState::new`), so this is the only hop where compression is
    // actually applied.
    if use_compression {
        app.layer(CompressionLayer::new())
    } else {
        app
    }
}
