//! Default backend nodes, derived when no layer configured any.

use super::types::BackendKind;

/// Environment variable holding a comma-separated etcd peer list.
pub const ETCD_PEERS_ENV: &str = "ETCDCTL_PEERS";

/// Default consul agent address.
pub const DEFAULT_CONSUL_NODE: &str = "127.0.0.1:8500";

/// Default etcd node when `ETCDCTL_PEERS` is unset or empty.
pub const DEFAULT_ETCD_NODE: &str = "127.0.0.1:4100";

/// Node list for `kind` when none was configured.
///
/// `env_peers` is the raw value of [`ETCD_PEERS_ENV`] and is only consulted
/// for etcd. Unsupported kinds get an empty list.
pub fn default_nodes(kind: &BackendKind, env_peers: Option<&str>) -> Vec<String> {
    match kind {
        BackendKind::Consul => vec![DEFAULT_CONSUL_NODE.to_string()],
        BackendKind::Etcd => match env_peers.map(split_peers) {
            Some(peers) if !peers.is_empty() => peers,
            _ => vec![DEFAULT_ETCD_NODE.to_string()],
        },
        BackendKind::Unsupported(_) => Vec::new(),
    }
}

/// Whether `env_peers` would supply the etcd node list.
pub(crate) fn peers_from_env(kind: &BackendKind, env_peers: Option<&str>) -> bool {
    matches!(kind, BackendKind::Etcd) && env_peers.is_some_and(|p| !split_peers(p).is_empty())
}

fn split_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(String::from)
        .collect()
}
