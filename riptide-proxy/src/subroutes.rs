//! Mission-control / profiling sub-hostnames are optional collaborators
//! (spec.md §1, §4.9): "wired by the server assembly step only when their
//! providers are present; they are not required for correctness." This
//! trait is the seam `riptide-server` mounts such a provider through,
//! without `riptide-proxy` knowing anything about what it serves.

use axum::Router;

use crate::AppState;

/// A plug-in that wants its own routes mounted under a dedicated
/// sub-hostname (e.g. `mc.riptide.test`, `pprof.riptide.test`).
pub trait SubrouteProvider: Send + Sync {
    /// The subdomain label this provider mounts under, relative to the
    /// configured base URL (e.g. `"mc"` for `mc.<base_url>`).
    fn subdomain(&self) -> &str;

    /// Builds the provider's own sub-router, merged into the application
    /// router at server-assembly time.
    fn routes(&self) -> Router<AppState>;
}
