use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clusterconf::ClusterConfig;
use clusterconf::ConfigCaller;
use clusterconf::ConfigManager;
use clusterconf::DocumentStore;
use clusterconf::Error;
use clusterconf::ExecStatus;
use clusterconf::Handler;
use clusterconf::HandlerResult;
use clusterconf::NodeConfig;
use tokio::time::timeout;

use crate::common::mem_manager;
use crate::common::node_with_iface;
use crate::common::record_nodes;
use crate::common::test_settings;
use crate::common::wait_until;

#[tokio::test]
async fn node_document_lifecycle() {
    let (manager, _store) = mem_manager();
    let seen = record_nodes(&manager, "lifecycle");

    manager.set_node_conf(&node_with_iface("n1", "eth0")).unwrap();
    assert!(
        wait_until(|| {
            seen.lock()
                .iter()
                .any(|(id, iface)| id == "n1" && iface == "eth0")
        })
        .await
    );

    let nodes = manager.enumerate_node_conf().unwrap();
    assert_eq!(nodes.len(), 1);
    assert!(nodes.get("n1").is_some());

    manager.delete_node_conf("n1").unwrap();
    assert!(manager.get_node_conf("n1").unwrap_err().is_not_found());
    assert!(manager.enumerate_node_conf().unwrap().is_empty());
}

#[tokio::test]
async fn burst_of_writes_is_applied_in_order_and_settles_on_last() {
    let (manager, _store) = mem_manager();
    let seen = record_nodes(&manager, "burst");

    for i in 0..20 {
        manager
            .set_node_conf(&node_with_iface("n1", &format!("eth{i}")))
            .unwrap();
    }

    assert!(wait_until(|| seen.lock().last().map(|(_, iface)| iface.as_str()) == Some("eth19")).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let seen = seen.lock();
    assert!(seen.len() <= 20);
    assert_eq!(seen.last().map(|(_, iface)| iface.as_str()), Some("eth19"));
    let order: Vec<u32> = seen
        .iter()
        .map(|(_, iface)| iface.trim_start_matches("eth").parse().unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "applied out of order: {:?}", order);
}

#[tokio::test]
async fn changes_from_another_manager_reach_watchers() {
    let (watcher, store) = mem_manager();
    let writer = ConfigManager::new(store, &test_settings()).unwrap();

    let modes = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = modes.clone();
    watcher
        .watch_cluster("mode", move |conf| {
            sink.lock().push(conf.mode.clone());
            Ok(())
        })
        .unwrap();

    writer
        .set_cluster_conf(Some(&ClusterConfig {
            mode: "maintenance".to_string(),
            ..Default::default()
        }))
        .unwrap();

    assert!(wait_until(|| modes.lock().contains(&"maintenance".to_string())).await);
    assert_eq!(watcher.get_cluster_conf().unwrap().mode, "maintenance");
}

#[tokio::test]
async fn watchers_only_see_their_band() {
    let (manager, _store) = mem_manager();
    let cluster_calls = Arc::new(AtomicUsize::new(0));
    let counter = cluster_calls.clone();
    manager
        .watch_cluster("cluster", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    let nodes = record_nodes(&manager, "node");

    manager.set_node_conf(&NodeConfig::init("n1")).unwrap();
    manager.set_node_conf(&NodeConfig::init("n2")).unwrap();
    assert!(wait_until(|| nodes.lock().len() == 2).await);
    assert_eq!(cluster_calls.load(Ordering::SeqCst), 0);

    manager.set_cluster_conf(Some(&ClusterConfig::init())).unwrap();
    assert!(wait_until(|| cluster_calls.load(Ordering::SeqCst) == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(nodes.lock().len(), 2);
}

#[tokio::test]
async fn node_recreated_after_delete_is_applied_again() {
    let (manager, _store) = mem_manager();
    let seen = record_nodes(&manager, "recreate");

    manager.set_node_conf(&node_with_iface("n1", "eth0")).unwrap();
    assert!(wait_until(|| seen.lock().len() == 1).await);

    manager.delete_node_conf("n1").unwrap();
    manager.set_node_conf(&node_with_iface("n1", "eth9")).unwrap();

    assert!(wait_until(|| seen.lock().last().map(|(_, i)| i.as_str()) == Some("eth9")).await);
}

#[tokio::test]
async fn undecodable_write_fails_cycle_until_fixed() {
    let (manager, store) = mem_manager();
    let seen = record_nodes(&manager, "strict");

    store
        .put("osdconfig/nodeConf/n1", b"{\"network\": [".to_vec(), None)
        .unwrap();
    assert!(
        wait_until(|| matches!(
            manager.get_status().get("strict").map(|s| s.status.clone()),
            Some(ExecStatus::Failed(_))
        ))
        .await
    );
    assert!(matches!(manager.error(), Err(Error::Execution { .. })));
    assert!(seen.lock().is_empty());

    manager.set_node_conf(&node_with_iface("n1", "eth0")).unwrap();
    assert!(wait_until(|| seen.lock().len() == 1).await);
    assert!(manager.error().is_ok());
}

#[tokio::test]
async fn abort_with_slow_handlers_in_flight() {
    let (manager, _store) = mem_manager();
    let fast_done = Arc::new(AtomicUsize::new(0));
    for i in 0..5 {
        let done = fast_done.clone();
        manager
            .register(
                &format!("fast-{i}"),
                Handler::cluster(move |_conf, _token| {
                    let done = done.clone();
                    async move {
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();
        manager
            .register(
                &format!("slow-{i}"),
                Handler::cluster(|_conf, _token| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }),
            )
            .unwrap();
    }

    manager.set_cluster_conf(Some(&ClusterConfig::init())).unwrap();
    assert!(wait_until(|| fast_done.load(Ordering::SeqCst) == 5).await);

    manager.abort();
    assert!(timeout(Duration::from_millis(500), manager.wait()).await.is_ok());

    // The pipeline keeps going after an abort.
    let seen = record_nodes(&manager, "after-abort");
    manager.set_node_conf(&NodeConfig::init("n1")).unwrap();
    assert!(wait_until(|| seen.lock().len() == 1).await);

    assert!(timeout(Duration::from_secs(1), manager.shutdown()).await.is_ok());
}

#[tokio::test]
async fn handler_panicking_synchronously_does_not_stop_the_pipeline() {
    let (manager, _store) = mem_manager();
    manager
        .register(
            "panics-early",
            Handler::cluster(|_conf, _token| -> std::future::Ready<HandlerResult> {
                panic!("cluster handler bug");
            }),
        )
        .unwrap();
    let seen = record_nodes(&manager, "survivor");

    manager.set_cluster_conf(Some(&ClusterConfig::init())).unwrap();
    assert!(
        wait_until(|| matches!(
            manager.get_status().get("panics-early").map(|s| s.status.clone()),
            Some(ExecStatus::Failed(_))
        ))
        .await
    );

    manager.set_node_conf(&NodeConfig::init("n1")).unwrap();
    assert!(wait_until(|| seen.lock().iter().any(|(id, _)| id == "n1")).await);
    assert!(timeout(Duration::from_secs(1), manager.shutdown()).await.is_ok());
}
