/// Default key root under which all configuration documents live
pub const DEFAULT_ROOT_KEY: &str = "osdconfig";

/// Key suffix of the cluster-wide document
pub const CLUSTER_CONF_KEY: &str = "clusterConf";

/// Key prefix of per-node documents
pub const NODE_CONF_KEY: &str = "nodeConf";

/// Key path separator
pub const KEY_SEPARATOR: char = '/';

/// Default interval between watch loop drains when no trigger fires
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Name of the tree used by the sled backend
pub const SLED_TREE_NAME: &str = "clusterconf";

/// How long a sled watch thread blocks before re-checking its stop flag
pub const SLED_WATCH_POLL_MS: u64 = 100;
