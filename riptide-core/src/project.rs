use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The separator between a project name and a service name in a Host header
/// and in cache keys (`<project>--<service>`).
pub const SEP: &str = "--";

/// A single service inside a project's `app.services` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Role this service plays (e.g. `"main"`). Only one service per project
    /// should carry the `main` role; the resolver picks it when no service
    /// name is present in the Host header.
    #[serde(default)]
    pub role: Option<String>,

    /// Free-form labels, not interpreted by the proxy.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// A project document as loaded from a project's `riptide.yml`.
///
/// Only the fields the proxy actually reads are modeled here; a real
/// project file may carry many more (commands, volumes, image build
/// instructions, ...) that are meaningful to the engine but opaque to
/// routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub app: App,

    /// Explicit list of services to start on autostart, overriding
    /// `app.services.keys()`.
    #[serde(default)]
    pub default_services: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub services: HashMap<String, Service>,
}

impl Project {
    /// Returns the name of the service carrying the `"main"` role, if any.
    pub fn main_service_name(&self) -> Option<&str> {
        self.app
            .services
            .iter()
            .find(|(_, svc)| svc.role.as_deref() == Some("main"))
            .map(|(name, _)| name.as_str())
    }

    /// Returns `true` if `service_name` is one of this project's services.
    pub fn has_service(&self, service_name: &str) -> bool {
        self.app.services.contains_key(service_name)
    }

    /// Services to start during autostart: `default_services` if set,
    /// otherwise every service in `app.services`.
    pub fn services_to_start(&self) -> Vec<String> {
        match &self.default_services {
            Some(services) => services.clone(),
            None => self.app.services.keys().cloned().collect(),
        }
    }
}

/// Identifies a single service belonging to a single project.
///
/// Used as the key into the address cache and as the autostart
/// subscriber-set key (by `project` alone).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub project: String,
    pub service: String,
}

impl ServiceKey {
    pub fn new(project: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            service: service.into(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.project, SEP, self.service)
    }
}

/// Maps a project name to the filesystem path of its project file.
///
/// Reloaded in full whenever a lookup misses, so that newly-created
/// projects become visible without a restart.
pub type ProjectsMapping = HashMap<String, PathBuf>;

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with_services(main: &str, others: &[&str]) -> Project {
        let mut services = HashMap::new();
        services.insert(
            main.to_string(),
            Service {
                role: Some("main".to_string()),
                labels: HashMap::new(),
            },
        );
        for o in others {
            services.insert(
                o.to_string(),
                Service {
                    role: None,
                    labels: HashMap::new(),
                },
            );
        }
        Project {
            name: "demo".to_string(),
            app: App { services },
            default_services: None,
        }
    }

    #[test]
    fn main_service_name_finds_role() {
        let p = project_with_services("web", &["db"]);
        assert_eq!(p.main_service_name(), Some("web"));
    }

    #[test]
    fn main_service_name_none_when_no_role() {
        let mut services = HashMap::new();
        services.insert(
            "web".to_string(),
            Service {
                role: None,
                labels: HashMap::new(),
            },
        );
        let p = Project {
            name: "demo".to_string(),
            app: App { services },
            default_services: None,
        };
        assert_eq!(p.main_service_name(), None);
    }

    #[test]
    fn services_to_start_defaults_to_all_services() {
        let p = project_with_services("web", &["db", "worker"]);
        let mut started = p.services_to_start();
        started.sort();
        assert_eq!(started, vec!["db", "web", "worker"]);
    }

    #[test]
    fn services_to_start_honors_explicit_default_services() {
        let mut p = project_with_services("web", &["db", "worker"]);
        p.default_services = Some(vec!["web".to_string()]);
        assert_eq!(p.services_to_start(), vec!["web".to_string()]);
    }

    #[test]
    fn service_key_display_uses_sep() {
        let key = ServiceKey::new("demo", "web");
        assert_eq!(key.to_string(), "demo--web");
    }
}
