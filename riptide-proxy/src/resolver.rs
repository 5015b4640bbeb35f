//! §4.4 Resolver — composes the Host Parser (`riptide_core::hostname`), the
//! Project Cache, and the Address Cache into the single tagged-union
//! decision both the HTTP and WebSocket handlers drive.

use std::sync::Arc;

use riptide_core::hostname::parse_host;
use riptide_core::project::Project;
use riptide_store::{Lookup, RuntimeStorage};

/// The resolver's decision, carrying exactly the payload each status
/// needs (spec.md §4.4 table). A sum type, not a pair with an untyped
/// second member — see spec.md §9.
#[derive(Debug, Clone)]
pub enum ResolveStatus {
    /// Request was for the bare base URL.
    NoProject,
    /// No mapping for the project name, even after a reload.
    ProjectNotFound { project_name: String },
    /// A project-load error occurred (`ProjectLoadError`, §4.2/§7).
    ProjectLoadError {
        project_name: String,
        error: Arc<anyhow::Error>,
    },
    /// No service was named and the project has no `"main"` service.
    NoMainService {
        project: Arc<Project>,
        requested_service: Option<String>,
    },
    /// An explicit service name isn't in `app.services`.
    ServiceNotFound {
        project: Arc<Project>,
        requested_service: String,
    },
    /// Address unavailable, autostart disabled.
    NotStarted {
        project: Arc<Project>,
        resolved_service: String,
    },
    /// Address unavailable, autostart enabled.
    NotStartedAutostart {
        project: Arc<Project>,
        resolved_service: String,
    },
    /// Container reachable.
    Success {
        project: Arc<Project>,
        resolved_service: String,
        upstream_url: String,
    },
}

/// Runs the Host Parser + Project Cache + Address Cache composition
/// described in spec.md §4.4.
pub async fn resolve(
    storage: &RuntimeStorage,
    host_header: &str,
    base_url: &str,
    autostart_enabled: bool,
) -> ResolveStatus {
    let parts = parse_host(host_header, base_url);

    let Some(project_name) = parts.project_name else {
        return ResolveStatus::NoProject;
    };

    let project = match storage.projects.get_or_load(&project_name) {
        Lookup::NotFound => {
            return ResolveStatus::ProjectNotFound { project_name };
        }
        Lookup::LoadError(error) => {
            return ResolveStatus::ProjectLoadError {
                project_name,
                error: Arc::new(error),
            };
        }
        Lookup::Found(project) => project,
    };

    let resolved_service = match parts.requested_service {
        Some(service_name) => {
            if !project.has_service(&service_name) {
                return ResolveStatus::ServiceNotFound {
                    project,
                    requested_service: service_name,
                };
            }
            service_name
        }
        None => match project.main_service_name() {
            Some(main) => main.to_string(),
            None => {
                return ResolveStatus::NoMainService {
                    project,
                    requested_service: None,
                };
            }
        },
    };

    match storage
        .addresses
        .resolve(storage.engine.as_ref(), &project, &resolved_service)
        .await
    {
        Some((host, port)) => ResolveStatus::Success {
            project,
            resolved_service,
            upstream_url: format!("http://{host}:{port}"),
        },
        None if autostart_enabled => ResolveStatus::NotStartedAutostart {
            project,
            resolved_service,
        },
        None => ResolveStatus::NotStarted {
            project,
            resolved_service,
        },
    }
}
