//! Layered configuration.
//!
//! Resolves the daemon configuration from three layers:
//! 1. **Defaults** - built in (`backend = "etcd"`, `confdir = "/etc/loadconfd"`,
//!    `interval = 600`, `prefix = "/"`, `scheme = "http"`)
//! 2. **File** - `--config-file`, else the first of `etc/loadconfd/loadconfd.toml`,
//!    `<user config dir>/loadconfd/loadconfd.toml`, `/etc/loadconfd/loadconfd.toml`
//! 3. **Flags** - only the flags actually passed on the command line
//!
//! If no layer sets `nodes`, they are derived from the backend kind
//! (`ETCDCTL_PEERS` for etcd).

mod flags;
mod loader;
mod merge;
mod nodes;
mod types;

pub use flags::{FlagValue, SuppliedFlags};
pub use loader::{
    ConfigFile, ConfigLayer, ConfigPaths, ConfigResolver, DEFAULT_CONFIG_FILE, FileFormat,
    ResolvedConfig, SYSTEM_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layer};
pub use nodes::{DEFAULT_CONSUL_NODE, DEFAULT_ETCD_NODE, ETCD_PEERS_ENV, default_nodes};
pub use types::*;
