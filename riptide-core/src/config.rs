use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level system configuration for Riptide Proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiptideConfig {
    /// Operational identifier, used only in logs/metrics labels.
    #[serde(default = "default_node_id")]
    pub node_id: String,

    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Which `riptide_engine::Engine` implementation to load.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Directories the project loader scans for `riptide.yml` files
    /// (spec.md §3 `ProjectsMapping`). Not one of spec.md §6's recognized
    /// keys — the original resolves this through riptide's own project
    /// discovery, external to this proxy; this field is the ambient stand-in
    /// so `riptide-server` has somewhere concrete to point the project
    /// loader at.
    #[serde(default = "default_project_dirs")]
    pub project_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Base URL all project subdomains are relative to, e.g. `"riptide.local"`.
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub ports: PortsConfig,

    /// Whether a not-yet-running target serves a start-it-for-me page
    /// (`true`) or a plain "not started" page (`false`).
    #[serde(default = "default_true")]
    pub autostart: bool,

    /// Whether upstream responses may be gzip-compressed by the proxy.
    #[serde(default)]
    pub compression: bool,

    /// CIDR allowlist for the autostart `start` action. `None` disables
    /// the restriction entirely (every client may trigger autostart).
    #[serde(default)]
    pub autostart_restrict: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsConfig {
    #[serde(default = "default_http_port")]
    pub http: u16,

    /// `0` disables the HTTPS listener.
    #[serde(default)]
    pub https: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            ports: PortsConfig::default(),
            autostart: true,
            compression: false,
            autostart_restrict: None,
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            http: default_http_port(),
            https: 0,
        }
    }
}

impl RiptideConfig {
    /// Load configuration from a YAML file plus `RIPTIDE_`-prefixed
    /// environment variable overrides (`RIPTIDE_PROXY__URL`, etc.).
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["riptide.yaml", "/etc/riptide/riptide.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("RIPTIDE_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }

    pub fn https_enabled(&self) -> bool {
        self.proxy.ports.https != 0
    }
}

impl Default for RiptideConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            proxy: ProxyConfig::default(),
            engine: default_engine(),
            project_dirs: default_project_dirs(),
        }
    }
}

fn default_node_id() -> String {
    "riptide-proxy".to_string()
}

fn default_url() -> String {
    "riptide.local".to_string()
}

fn default_http_port() -> u16 {
    80
}

fn default_true() -> bool {
    true
}

fn default_engine() -> String {
    "docker".to_string()
}

fn default_project_dirs() -> Vec<String> {
    vec![".".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_http_80_and_no_https() {
        let cfg = RiptideConfig::default();
        assert_eq!(cfg.proxy.ports.http, 80);
        assert!(!cfg.https_enabled());
        assert!(cfg.proxy.autostart);
    }

    #[test]
    fn https_enabled_when_port_nonzero() {
        let mut cfg = RiptideConfig::default();
        cfg.proxy.ports.https = 443;
        assert!(cfg.https_enabled());
    }

    #[test]
    fn load_from_yaml_overrides_defaults() {
        let path = std::env::temp_dir().join(format!(
            "riptide-config-test-{}-{}.yaml",
            std::process::id(),
            "load_from_yaml_overrides_defaults"
        ));
        std::fs::write(
            &path,
            r#"
proxy:
  url: dev.example
  ports:
    http: 8080
  autostart: false
  autostart_restrict:
    - 10.0.0.0/8
"#,
        )
        .unwrap();

        let cfg = RiptideConfig::load(Some(path.to_str().unwrap())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.proxy.url, "dev.example");
        assert_eq!(cfg.proxy.ports.http, 8080);
        assert!(!cfg.proxy.autostart);
        assert_eq!(
            cfg.proxy.autostart_restrict,
            Some(vec!["10.0.0.0/8".to_string()])
        );
    }
}
