//! Status-page rendering — spec.md treats the template contents themselves
//! as an out-of-scope collaborator (§1), but the HTTP handler still needs
//! real response bodies and the exact status codes from spec.md §4.5/§6.
//! `StatusPage` is the handler's only touchpoint with the template layer;
//! everything below is markup, not routing logic.

use askama::Template;
use askama_axum::IntoResponse;
use axum::http::StatusCode;
use axum::response::Response;

#[derive(Template)]
#[template(path = "landing.html")]
struct Landing<'a> {
    base_url: &'a str,
    projects: &'a [String],
    load_errors: &'a [(String, Vec<String>)],
}

#[derive(Template)]
#[template(path = "project_not_found.html")]
struct ProjectNotFound<'a> {
    project_name: &'a str,
}

#[derive(Template)]
#[template(path = "service_not_found.html")]
struct ServiceNotFound<'a> {
    project_name: &'a str,
    service_name: &'a str,
}

#[derive(Template)]
#[template(path = "no_main_service.html")]
struct NoMainService<'a> {
    project_name: &'a str,
}

#[derive(Template)]
#[template(path = "not_started.html")]
struct NotStarted<'a> {
    project_name: &'a str,
    service_name: &'a str,
}

#[derive(Template)]
#[template(path = "start_project.html")]
struct StartProject<'a> {
    project_name: &'a str,
    service_name: &'a str,
    project_name_json: String,
}

#[derive(Template)]
#[template(path = "bad_gateway.html")]
struct BadGateway<'a> {
    project_name: &'a str,
    service_name: &'a str,
}

#[derive(Template)]
#[template(path = "gateway_timeout.html")]
struct GatewayTimeout<'a> {
    project_name: &'a str,
    service_name: &'a str,
}

#[derive(Template)]
#[template(path = "internal_error.html")]
struct InternalError<'a> {
    project_name: &'a str,
    service_name: &'a str,
    causes: &'a [String],
}

#[derive(Template)]
#[template(path = "internal_error_project_load.html")]
struct InternalErrorProjectLoad<'a> {
    project_name: &'a str,
    causes: &'a [String],
}

/// Every status page spec.md §6 names, each carrying the payload it needs
/// and the fixed HTTP status code from spec.md §4.5.
pub enum StatusPage {
    /// `pp_landing_page`, 200.
    Landing {
        base_url: String,
        projects: Vec<String>,
        load_errors: Vec<(String, Vec<String>)>,
    },
    /// `pp_project_not_found`, 400.
    ProjectNotFound { project_name: String },
    /// `pp_service_not_found`, 400.
    ServiceNotFound {
        project_name: String,
        service_name: String,
    },
    /// `pp_no_main_service`, 503.
    NoMainService { project_name: String },
    /// `pp_project_not_started`, 503.
    NotStarted {
        project_name: String,
        service_name: String,
    },
    /// `pp_start_project`, 200.
    StartProject {
        project_name: String,
        service_name: String,
    },
    /// `pp_502`, 502.
    BadGateway {
        project_name: String,
        service_name: String,
    },
    /// `pp_gateway_timeout`, 504.
    GatewayTimeout {
        project_name: String,
        service_name: String,
    },
    /// `pp_500`, 500. Emitted after the one-shot cache-flush retry fails.
    InternalError {
        project_name: String,
        service_name: String,
        causes: Vec<String>,
    },
    /// `pp_500_project_load`, 500.
    InternalErrorProjectLoad {
        project_name: String,
        causes: Vec<String>,
    },
}

impl StatusPage {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StatusPage::Landing { .. } => StatusCode::OK,
            StatusPage::ProjectNotFound { .. } => StatusCode::BAD_REQUEST,
            StatusPage::ServiceNotFound { .. } => StatusCode::BAD_REQUEST,
            StatusPage::NoMainService { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StatusPage::NotStarted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StatusPage::StartProject { .. } => StatusCode::OK,
            StatusPage::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            StatusPage::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            StatusPage::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            StatusPage::InternalErrorProjectLoad { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            StatusPage::Landing {
                base_url,
                projects,
                load_errors,
            } => Landing {
                base_url,
                projects,
                load_errors,
            }
            .into_response(),
            StatusPage::ProjectNotFound { project_name } => ProjectNotFound { project_name }.into_response(),
            StatusPage::ServiceNotFound {
                project_name,
                service_name,
            } => ServiceNotFound {
                project_name,
                service_name,
            }
            .into_response(),
            StatusPage::NoMainService { project_name } => NoMainService { project_name }.into_response(),
            StatusPage::NotStarted {
                project_name,
                service_name,
            } => NotStarted {
                project_name,
                service_name,
            }
            .into_response(),
            StatusPage::StartProject {
                project_name,
                service_name,
            } => StartProject {
                project_name,
                service_name,
                project_name_json: serde_json::to_string(project_name).unwrap_or_default(),
            }
            .into_response(),
            StatusPage::BadGateway {
                project_name,
                service_name,
            } => BadGateway {
                project_name,
                service_name,
            }
            .into_response(),
            StatusPage::GatewayTimeout {
                project_name,
                service_name,
            } => GatewayTimeout {
                project_name,
                service_name,
            }
            .into_response(),
            StatusPage::InternalError {
                project_name,
                service_name,
                causes,
            } => InternalError {
                project_name,
                service_name,
                causes,
            }
            .into_response(),
            StatusPage::InternalErrorProjectLoad {
                project_name,
                causes,
            } => InternalErrorProjectLoad {
                project_name,
                causes,
            }
            .into_response(),
        };

        let mut response = body;
        *response.status_mut() = status;
        response
    }
}
