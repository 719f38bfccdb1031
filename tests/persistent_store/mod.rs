use std::time::Duration;

use clusterconf::ConfigCaller;
use clusterconf::ConfigManager;
use clusterconf::Settings;
use clusterconf::StoreBackend;
use tempfile::TempDir;

use crate::common::node_with_iface;
use crate::common::record_nodes;
use crate::common::test_settings;
use crate::common::wait_until;
use crate::enable_logger;

fn sled_settings(dir: &TempDir) -> Settings {
    let mut settings = test_settings();
    settings.store.backend = StoreBackend::Sled;
    settings.store.db_root_dir = dir.path().join("db");
    settings.store.root_key = "pwx/cluster-a".to_string();
    settings
}

#[tokio::test]
async fn sled_backend_delivers_changes_to_watchers() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::from_settings(&sled_settings(&dir)).unwrap();
    let seen = record_nodes(&manager, "sled");

    manager.set_node_conf(&node_with_iface("n1", "eth0")).unwrap();
    assert!(wait_until(|| seen.lock().iter().any(|(_, iface)| iface == "eth0")).await);

    manager.delete_node_conf("n1").unwrap();
    assert!(manager.get_node_conf("n1").unwrap_err().is_not_found());
    manager.shutdown().await;
}

#[tokio::test]
async fn sled_documents_survive_manager_restart() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = sled_settings(&dir);

    {
        let manager = ConfigManager::from_settings(&settings).unwrap();
        manager.set_node_conf(&node_with_iface("n1", "eth0")).unwrap();
        manager.set_node_conf(&node_with_iface("n2", "eth1")).unwrap();
        manager.shutdown().await;
    }
    // Give sled's background flusher time to release the directory.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let manager = ConfigManager::from_settings(&settings).unwrap();
    let nodes = manager.enumerate_node_conf().unwrap();
    let ids: Vec<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "n2"]);
    assert_eq!(manager.get_node_conf("n2").unwrap(), node_with_iface("n2", "eth1"));
}

#[tokio::test]
async fn settings_file_selects_backend() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("from-file");
    let config_path = dir.path().join("confmgr.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
            [watch]
            poll_interval_ms = 25
            enable_metrics = false

            [store]
            backend = "sled"
            root_key = "from-file"
            db_root_dir = "{}"
            "#,
            db_dir.display()
        ),
    )
    .unwrap();

    let settings = Settings::default()
        .with_override_config(config_path.to_str().unwrap())
        .unwrap()
        .validate()
        .unwrap();
    assert_eq!(settings.store.backend, StoreBackend::Sled);
    assert_eq!(settings.watch.poll_interval_ms, 25);

    let manager = ConfigManager::from_settings(&settings).unwrap();
    manager.set_node_conf(&node_with_iface("n1", "eth0")).unwrap();
    assert_eq!(manager.keys().node_key("n1"), "from-file/nodeConf/n1");
    manager.shutdown().await;
    assert!(db_dir.exists());
}
