//! Parses the `<project>--<service>.<base_url>` convention out of an
//! incoming Host header.

use crate::project::SEP;

/// The parsed project/service portion of a Host header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostParts {
    /// `None` when the request is for the bare base URL (landing page).
    pub project_name: Option<String>,
    /// `None` when the Host header carried no `SEP`-delimited service part.
    pub requested_service: Option<String>,
}

/// Parses `host` (the raw Host header value, may include a port) against
/// `base_url` (e.g. `"riptide.local"`).
///
/// Algorithm (matches the original Tornado handler):
///   1. Strip a trailing `:port` if present.
///   2. Strip the trailing `.base_url` suffix; if the remainder equals the
///      full host unchanged (i.e. the host IS the base url), this is the
///      landing page.
///   3. Take the last dot-delimited component of what remains, so any
///      additional left-side labels (arbitrary subdomains) are ignored.
///   4. Split that component on the first occurrence of `SEP`; the part
///      before is the project name, the part after (if any, rejoined if it
///      itself contains `SEP`) is the requested service name.
pub fn parse_host(host: &str, base_url: &str) -> HostParts {
    let host_no_port = host.split(':').next().unwrap_or(host);

    if host_no_port == base_url {
        return HostParts {
            project_name: None,
            requested_service: None,
        };
    }

    let suffix = format!(".{base_url}");
    let stripped = host_no_port.strip_suffix(&suffix).unwrap_or(host_no_port);

    // Arbitrary left-side subdomains are ignored: only the label
    // immediately before `.base_url` carries the project/service encoding.
    let label = stripped.rsplit('.').next().unwrap_or(stripped);

    match label.split_once(SEP) {
        Some((project, service)) if !project.is_empty() => HostParts {
            project_name: Some(project.to_string()),
            requested_service: Some(service.to_string()),
        },
        _ => HostParts {
            project_name: Some(label.to_string()),
            requested_service: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_base_url_is_landing_page() {
        let parts = parse_host("riptide.local", "riptide.local");
        assert_eq!(parts.project_name, None);
    }

    #[test]
    fn bare_base_url_with_port_is_landing_page() {
        let parts = parse_host("riptide.local:8080", "riptide.local");
        assert_eq!(parts.project_name, None);
    }

    #[test]
    fn project_only_host() {
        let parts = parse_host("myproject.riptide.local", "riptide.local");
        assert_eq!(parts.project_name.as_deref(), Some("myproject"));
        assert_eq!(parts.requested_service, None);
    }

    #[test]
    fn project_and_service_host() {
        let parts = parse_host("myproject--web.riptide.local", "riptide.local");
        assert_eq!(parts.project_name.as_deref(), Some("myproject"));
        assert_eq!(parts.requested_service.as_deref(), Some("web"));
    }

    #[test]
    fn service_name_may_itself_contain_sep() {
        let parts = parse_host("myproject--web--1.riptide.local", "riptide.local");
        assert_eq!(parts.project_name.as_deref(), Some("myproject"));
        assert_eq!(parts.requested_service.as_deref(), Some("web--1"));
    }

    #[test]
    fn port_is_stripped_before_parsing() {
        let parts = parse_host("myproject--web.riptide.local:443", "riptide.local");
        assert_eq!(parts.project_name.as_deref(), Some("myproject"));
        assert_eq!(parts.requested_service.as_deref(), Some("web"));
    }

    #[test]
    fn arbitrary_left_side_subdomains_are_ignored() {
        let parts = parse_host("preview.myproject--web.riptide.local", "riptide.local");
        assert_eq!(parts.project_name.as_deref(), Some("myproject"));
        assert_eq!(parts.requested_service.as_deref(), Some("web"));
    }

    #[test]
    fn arbitrary_left_side_subdomains_ignored_without_service() {
        let parts = parse_host("a.b.c.myproject.riptide.local", "riptide.local");
        assert_eq!(parts.project_name.as_deref(), Some("myproject"));
        assert_eq!(parts.requested_service, None);
    }

    /// P1: reconstructing `"{project}{SEP}{service}.{base_url}"` and parsing
    /// it always round-trips back to `(project, service)`.
    #[test]
    fn round_trips_for_arbitrary_project_service_pairs() {
        let base_url = "riptide.test";
        for (project, service) in [
            ("proj1", "svc"),
            ("a", "b"),
            ("my-project", "api-server"),
        ] {
            let host = format!("{project}{SEP}{service}.{base_url}");
            let parts = parse_host(&host, base_url);
            assert_eq!(parts.project_name.as_deref(), Some(project));
            assert_eq!(parts.requested_service.as_deref(), Some(service));
        }
    }
}
