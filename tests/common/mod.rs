use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use clusterconf::ConfigManager;
use clusterconf::DocumentStore;
use clusterconf::MemStore;
use clusterconf::NetworkConfig;
use clusterconf::NodeConfig;
use clusterconf::Settings;
use parking_lot::Mutex;

use crate::enable_logger;

pub const WAIT_FOR_CALLBACK_IN_SEC: u64 = 3;

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.watch.poll_interval_ms = 20;
    settings.watch.enable_metrics = false;
    settings
}

/// A manager over a fresh in-memory store, plus the store itself so a test
/// can attach more managers or write behind the manager's back.
pub fn mem_manager() -> (ConfigManager, Arc<dyn DocumentStore>) {
    enable_logger();
    let store: Arc<dyn DocumentStore> = Arc::new(MemStore::new());
    let manager = ConfigManager::new(store.clone(), &test_settings()).expect("manager starts");
    (manager, store)
}

pub fn node_with_iface(
    node_id: &str,
    iface: &str,
) -> NodeConfig {
    NodeConfig {
        node_id: node_id.to_string(),
        network: Some(NetworkConfig {
            data_iface: iface.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn data_iface(node: &NodeConfig) -> String {
    node.network
        .as_ref()
        .map(|n| n.data_iface.clone())
        .unwrap_or_default()
}

/// Registers a node watcher that records `(node_id, data_iface)` pairs.
pub fn record_nodes(
    manager: &ConfigManager,
    name: &str,
) -> Arc<Mutex<Vec<(String, String)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .watch_node(name, move |node| {
            sink.lock().push((node.node_id.clone(), data_iface(node)));
            Ok(())
        })
        .expect("register node watcher");
    seen
}

pub async fn wait_until<F>(cond: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(WAIT_FOR_CALLBACK_IN_SEC);
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
