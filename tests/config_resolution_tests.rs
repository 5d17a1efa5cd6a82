//! Integration tests for layered configuration resolution.
//!
//! Drives the resolver the way the binary does: real command-line parsing,
//! config files on disk, and an explicit etcd peer list in place of the
//! process environment.

use loadconfd::backends::{BackendDescriptor, StoreClientRegistry};
use loadconfd::cli::Cli;
use loadconfd::config::{
    BackendKind, Config, ConfigFile, ConfigLayer, ConfigPaths, ConfigResolver, Scheme,
    SuppliedFlags,
};
use loadconfd::error::{BackendError, ConfigError};
use std::path::PathBuf;
use tempfile::TempDir;

/// Parse a command line into supplied flags plus the config file path.
fn flags_from(args: &[&str]) -> (SuppliedFlags, Option<PathBuf>) {
    let mut argv = vec!["loadconfd"];
    argv.extend_from_slice(args);
    let (cli, matches) = Cli::try_parse_with_matches(argv).expect("valid command line");
    (cli.supplied_flags(&matches), cli.config_file)
}

/// Resolve with a file written into a fresh temp dir and no etcd peers in the environment.
fn resolve_with_file(contents: &str, args: &[&str]) -> Result<Config, ConfigError> {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("loadconfd.toml");
    std::fs::write(&path, contents).unwrap();

    let (flags, _) = flags_from(args);
    let file = ConfigFile::read(&path)?;
    ConfigResolver::with_env_peers(None)
        .resolve(Some(&file), &flags)
        .map(|r| r.into_config())
}

mod precedence {
    use super::*;

    #[test]
    fn disjoint_layers_union_without_loss() {
        let config = resolve_with_file(
            "prefix = \"/production\"\nclient_cert = \"/ssl/client.pem\"\n",
            &["--interval", "30", "--verbose"],
        )
        .unwrap();

        // defaults
        assert_eq!(config.backend, BackendKind::Etcd);
        assert_eq!(config.confdir, PathBuf::from("/etc/loadconfd"));
        assert_eq!(config.scheme, Scheme::Http);
        // file
        assert_eq!(config.prefix, "/production");
        assert_eq!(config.client_cert, Some(PathBuf::from("/ssl/client.pem")));
        // flags
        assert_eq!(config.interval, 30);
        assert!(config.verbose);
    }

    #[test]
    fn supplied_flag_beats_file() {
        let config = resolve_with_file(
            "backend = \"etcd\"\nprefix = \"/file\"\n",
            &["--backend", "consul", "--prefix", "/flag"],
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Consul);
        assert_eq!(config.prefix, "/flag");
    }

    #[test]
    fn unsupplied_flags_never_clobber_file() {
        // Every flag below has a built-in default; none is passed.
        let config = resolve_with_file(
            r#"
backend = "consul"
confdir = "/srv/loadconfd"
interval = 45
prefix = "/staging"
scheme = "https"
debug = true
"#,
            &[],
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Consul);
        assert_eq!(config.confdir, PathBuf::from("/srv/loadconfd"));
        assert_eq!(config.interval, 45);
        assert_eq!(config.prefix, "/staging");
        assert_eq!(config.scheme, Scheme::Https);
        assert!(config.debug);
    }

    #[test]
    fn node_flag_replaces_file_nodes() {
        let config = resolve_with_file(
            "nodes = [\"10.0.0.1:4100\", \"10.0.0.2:4100\"]\n",
            &["--node", "10.9.9.9:4100"],
        )
        .unwrap();
        assert_eq!(config.nodes, vec!["10.9.9.9:4100"]);
    }

    #[test]
    fn legacy_backends_key_is_accepted() {
        let config = resolve_with_file("backends = \"consul\"\n", &[]).unwrap();
        assert_eq!(config.backend, BackendKind::Consul);
    }

    #[test]
    fn same_inputs_resolve_identically() {
        let args = ["--quiet", "--scheme", "https", "--node", "a:1", "--node", "b:2"];
        let first = resolve_with_file("interval = 9\n", &args).unwrap();
        let second = resolve_with_file("interval = 9\n", &args).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn provenance_is_recorded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("loadconfd.toml");
        std::fs::write(&path, "prefix = \"/p\"\n").unwrap();

        let (flags, config_file) =
            flags_from(&["--config-file", path.to_str().unwrap(), "--debug"]);
        let paths = ConfigPaths::with_candidates(config_file, vec![]);
        let resolved = ConfigResolver::with_env_peers(Some("10.0.0.1:4100".into()))
            .load(&paths, &flags)
            .unwrap();

        assert_eq!(resolved.config_path(), Some(path.as_path()));
        assert_eq!(resolved.source_of("prefix"), Some(ConfigLayer::File));
        assert_eq!(resolved.source_of("debug"), Some(ConfigLayer::Flags));
        assert_eq!(resolved.source_of("interval"), Some(ConfigLayer::Defaults));
        assert_eq!(resolved.source_of("nodes"), Some(ConfigLayer::Environment));
    }
}

mod node_defaults {
    use super::*;

    #[test]
    fn consul_defaults_to_local_agent() {
        let (flags, _) = flags_from(&["--backend", "consul"]);
        let config = ConfigResolver::with_env_peers(Some("10.0.0.1:4100".into()))
            .resolve(None, &flags)
            .unwrap()
            .into_config();
        assert_eq!(config.nodes, vec!["127.0.0.1:8500"]);
    }

    #[test]
    fn etcd_reads_peer_list() {
        let config = ConfigResolver::with_env_peers(Some("10.0.0.1:4100,10.0.0.2:4100".into()))
            .resolve(None, &SuppliedFlags::new())
            .unwrap()
            .into_config();
        assert_eq!(config.nodes, vec!["10.0.0.1:4100", "10.0.0.2:4100"]);
    }

    #[test]
    fn etcd_without_peers_uses_local_node() {
        for peers in [None, Some(String::new())] {
            let config = ConfigResolver::with_env_peers(peers)
                .resolve(None, &SuppliedFlags::new())
                .unwrap()
                .into_config();
            assert_eq!(config.nodes, vec!["127.0.0.1:4100"]);
        }
    }

    #[test]
    fn unsupported_backend_fails_at_client_construction() {
        let (flags, _) = flags_from(&["--backend", "zookeeper"]);
        let config = ConfigResolver::with_env_peers(None)
            .resolve(None, &flags)
            .unwrap()
            .into_config();
        assert!(config.nodes.is_empty());

        let descriptor = BackendDescriptor::from_config(&config);
        assert_eq!(
            StoreClientRegistry::validate(&descriptor),
            Err(BackendError::NoNodes("zookeeper".into()))
        );
    }
}

mod failures {
    use super::*;

    #[test]
    fn malformed_file_is_fatal() {
        let err = resolve_with_file("backend = [\n", &["--backend", "consul"]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unreadable_explicit_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_candidates(Some(temp.path().join("missing.toml")), vec![]);
        let err = ConfigResolver::with_env_peers(None)
            .load(&paths, &SuppliedFlags::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn zero_interval_flag_is_rejected() {
        let (flags, _) = flags_from(&["--interval", "0"]);
        let err = ConfigResolver::with_env_peers(None)
            .resolve(None, &flags)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn empty_backend_in_file_is_rejected() {
        assert!(resolve_with_file("backend = \"\"\n", &[]).is_err());
    }
}
