pub mod http;
pub mod pages;
pub mod resolver;
pub mod router;
pub mod subroutes;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use riptide_observability::metrics::MetricsCollector;
use riptide_store::RuntimeStorage;

/// Shared application state threaded through every HTTP/WS handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: RuntimeStorage,
    pub base_url: String,
    pub autostart_enabled: bool,
    pub http_client: reqwest::Client,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(
        storage: RuntimeStorage,
        base_url: String,
        autostart_enabled: bool,
        metrics: Arc<MetricsCollector>,
    ) -> anyhow::Result<Self> {
        // The upstream HTTP client always transparently decompresses gzip
        // bodies (`reqwest`'s `gzip` feature), since §4.5 step 3 strips
        // `Content-Encoding` from every forwarded response regardless of
        // `use_compression` — a body left gzip-encoded with that header
        // stripped would be corrupt on arrival. `use_compression` instead
        // governs whether `riptide-server` compresses the proxy's own
        // response to the client (`tower_http::compression::CompressionLayer`
        // in `riptide_proxy::router`), a separate hop.
        let http_client = reqwest::Client::builder()
            .connect_timeout(http::UPSTREAM_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            storage,
            base_url,
            autostart_enabled,
            http_client,
            metrics,
        })
    }
}

/// Matches `http::UPSTREAM_REQUEST_TIMEOUT`'s default magnitude for call
/// sites that only need a sane fallback (tests, demos) and don't want to
/// import the `http` module directly.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = http::UPSTREAM_REQUEST_TIMEOUT;
