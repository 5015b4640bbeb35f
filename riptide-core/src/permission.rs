//! CIDR-based gate for the autostart WebSocket endpoint.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::warn;

/// Returns `true` if `client_ip` is allowed to trigger autostart.
///
/// When `restrict` is `None`, every client is permitted (matches the
/// original's `'autostart_restrict' not in config` shortcut). When present,
/// the client's `/32` must overlap at least one configured network;
/// malformed entries on either side are logged and skipped rather than
/// treated as a hard failure.
pub fn check_permission(client_ip: Ipv4Addr, restrict: Option<&[String]>) -> bool {
    let Some(restrict) = restrict else {
        return true;
    };

    for network_str in restrict {
        match network_str.parse::<Ipv4Net>() {
            Ok(network) => {
                if network.contains(&client_ip) {
                    return true;
                }
            }
            Err(err) => {
                warn!(network = %network_str, error = %err, "invalid IPv4 network in autostart_restrict");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_restriction_allows_everyone() {
        assert!(check_permission("8.8.8.8".parse().unwrap(), None));
    }

    #[test]
    fn client_inside_allowed_network_is_permitted() {
        let restrict = vec!["10.0.0.0/8".to_string()];
        assert!(check_permission("10.1.2.3".parse().unwrap(), Some(&restrict)));
    }

    #[test]
    fn client_outside_all_allowed_networks_is_denied() {
        let restrict = vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()];
        assert!(!check_permission("8.8.8.8".parse().unwrap(), Some(&restrict)));
    }

    #[test]
    fn malformed_network_entry_is_skipped_not_fatal() {
        let restrict = vec!["not-a-cidr".to_string(), "127.0.0.0/8".to_string()];
        assert!(check_permission("127.0.0.1".parse().unwrap(), Some(&restrict)));
    }

    #[test]
    fn exact_host_network_matches() {
        let restrict = vec!["192.168.1.50/32".to_string()];
        assert!(check_permission("192.168.1.50".parse().unwrap(), Some(&restrict)));
        assert!(!check_permission("192.168.1.51".parse().unwrap(), Some(&restrict)));
    }
}
