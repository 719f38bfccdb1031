//! Configuration manager facade.
//!
//! Owns the callback registry, the execution engine and the change pipeline
//! of one manager instance, and exposes the document CRUD surface on top of
//! a shared document store.

mod null_manager;
mod routes;
pub use null_manager::*;
pub use routes::*;


use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::async_task::spawn_task;
use crate::constants::KEY_SEPARATOR;
use crate::metrics::init_default_registry;
use crate::open_store;
use crate::overlay_document;
use crate::Band;
use crate::CallbackRegistry;
use crate::CallbackStatus;
use crate::ChangePipeline;
use crate::ClusterConfig;
use crate::DocumentStore;
use crate::Error;
use crate::ExecutionEngine;
use crate::Handler;
use crate::HandlerResult;
use crate::InputError;
use crate::KeySpace;
use crate::NodeConfig;
use crate::NodesConfig;
use crate::Result;
use crate::Settings;
use crate::StoreError;
use crate::WatchId;

/// Document CRUD operations shared by every facade implementation.
///
/// The `update_*` methods carry the partial-update semantics of an HTTP
/// POST: read the current document, overlay the JSON patch, write it back.
pub trait ConfigCaller: Send + Sync {
    fn get_cluster_conf(&self) -> Result<ClusterConfig>;

    /// Fully replaces the cluster document. `None` is rejected.
    fn set_cluster_conf(
        &self,
        conf: Option<&ClusterConfig>,
    ) -> Result<()>;

    fn get_node_conf(
        &self,
        node_id: &str,
    ) -> Result<NodeConfig>;

    fn set_node_conf(
        &self,
        conf: &NodeConfig,
    ) -> Result<()>;

    fn delete_node_conf(
        &self,
        node_id: &str,
    ) -> Result<()>;

    /// Every node document, ordered by node id. Any unreadable node fails
    /// the whole call.
    fn enumerate_node_conf(&self) -> Result<NodesConfig>;

    fn update_cluster_conf(
        &self,
        patch: Value,
    ) -> Result<ClusterConfig> {
        let current = self.get_cluster_conf()?;
        let updated: ClusterConfig = overlay_document(&current, patch)
            .map_err(|e| InputError::MalformedDocument(e.to_string()))?;
        self.set_cluster_conf(Some(&updated))?;
        Ok(updated)
    }

    /// The node is named by the patch's `node_id`. A node without a stored
    /// document starts from an empty one.
    fn update_node_conf(
        &self,
        patch: Value,
    ) -> Result<NodeConfig> {
        let node_id = patch
            .get("node_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(InputError::EmptyNodeId)?
            .to_string();

        let current = match self.get_node_conf(&node_id) {
            Ok(conf) => conf,
            Err(e) if e.is_not_found() => NodeConfig {
                node_id: node_id.clone(),
                ..Default::default()
            },
            Err(e) => return Err(e),
        };
        let updated: NodeConfig = overlay_document(&current, patch)
            .map_err(|e| InputError::MalformedDocument(e.to_string()))?;
        self.set_node_conf(&updated)?;
        Ok(updated)
    }
}

pub struct ConfigManager {
    store: Arc<dyn DocumentStore>,
    keys: KeySpace,
    registry: Arc<CallbackRegistry>,
    engine: Arc<ExecutionEngine>,
    pipeline: Arc<ChangePipeline>,
    root: CancellationToken,
    /// Serializes facade bookkeeping; never held across a store call
    bookkeeping: Mutex<()>,
    watch_ids: Mutex<Vec<WatchId>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("keys", &self.keys)
            .field("closed", &self.root.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    /// Builds a manager over `store` and starts its watch loop.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settings: &Settings,
    ) -> Result<Self> {
        Self::with_cancellation(store, settings, CancellationToken::new())
    }

    /// Opens the store named by `settings` and builds a manager over it.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = open_store(&settings.store)?;
        Self::new(store, settings)
    }

    /// Like `new`, with the manager's root token derived from `parent` so
    /// that cancelling `parent` closes the manager's execution.
    pub fn with_cancellation(
        store: Arc<dyn DocumentStore>,
        settings: &Settings,
        parent: CancellationToken,
    ) -> Result<Self> {
        if settings.watch.enable_metrics {
            init_default_registry();
        }
        let keys = KeySpace::new(settings.store.root_key.as_str());
        let root = parent.child_token();
        let registry = Arc::new(CallbackRegistry::new());
        let engine = Arc::new(ExecutionEngine::new(
            registry.clone(),
            root.clone(),
            settings.watch.enable_metrics,
        ));
        let pipeline = Arc::new(ChangePipeline::new(
            keys.clone(),
            engine.clone(),
            settings.watch.poll_interval(),
            settings.watch.enable_metrics,
        ));

        let mut watch_ids = Vec::with_capacity(2);
        for (prefix, band) in [
            (keys.cluster_key(), Band::Cluster),
            (keys.node_prefix(), Band::Node),
        ] {
            match store.watch_subtree(&prefix, 0, pipeline.watch_callback(band)) {
                Ok(id) => watch_ids.push(id),
                Err(e) => {
                    for id in watch_ids {
                        let _ = store.unwatch(id);
                    }
                    return Err(e);
                }
            }
        }

        let loop_pipeline = pipeline.clone();
        let loop_token = root.clone();
        let handle = spawn_task("config-watch-loop", move || loop_pipeline.run(loop_token));

        info!(root = %keys.root(), "config manager started");
        Ok(Self {
            store,
            keys,
            registry,
            engine,
            pipeline,
            root,
            bookkeeping: Mutex::new(()),
            watch_ids: Mutex::new(watch_ids),
            loop_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn pipeline(&self) -> &Arc<ChangePipeline> {
        &self.pipeline
    }

    fn ensure_open(&self) -> Result<()> {
        if self.root.is_cancelled() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn read_document<T>(
        &self,
        key: &str,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.ensure_open()?;
        let pair = self
            .store
            .get(key)?
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        Ok(serde_json::from_slice(&pair.value)?)
    }

    fn write_document<T>(
        &self,
        key: &str,
        doc: &T,
    ) -> Result<()>
    where
        T: serde::Serialize,
    {
        let value = {
            let _guard = self.bookkeeping.lock();
            self.ensure_open()?;
            serde_json::to_vec(doc)?
        };
        let pair = self.store.put(key, value, None)?;
        debug!(key = %key, index = pair.modified_index, "document written");
        Ok(())
    }

    /// Registers `handler` under `name` in the band its variant names.
    pub fn register(
        &self,
        name: &str,
        handler: Handler,
    ) -> Result<()> {
        self.ensure_open()?;
        self.registry.register(name, handler)
    }

    /// Registers a synchronous callback for cluster document changes.
    pub fn watch_cluster<F>(
        &self,
        name: &str,
        f: F,
    ) -> Result<()>
    where
        F: Fn(&ClusterConfig) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(name, Handler::blocking_cluster(f))
    }

    /// Registers a synchronous callback for node document changes.
    pub fn watch_node<F>(
        &self,
        name: &str,
        f: F,
    ) -> Result<()>
    where
        F: Fn(&NodeConfig) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(name, Handler::blocking_node(f))
    }

    /// Per-callback outcome of the latest execution cycle.
    pub fn get_status(&self) -> HashMap<String, CallbackStatus> {
        self.engine.get_status()
    }

    /// Fails if any callback of the latest execution cycle failed.
    pub fn error(&self) -> Result<()> {
        self.engine.error()
    }

    /// Stops waiting on the current execution cycle.
    pub fn abort(&self) {
        self.engine.abort();
    }

    /// Waits for the latest execution cycle to finish or be aborted.
    pub async fn wait(&self) {
        self.engine.wait().await;
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancels the root token, stops the watch loop and releases the store
    /// watches. Calling it again is a no-op.
    pub fn close(&self) {
        let watch_ids = {
            let _guard = self.bookkeeping.lock();
            if !self.root.is_cancelled() {
                info!(root = %self.keys.root(), "close config manager");
            }
            self.engine.close();
            self.root.cancel();
            std::mem::take(&mut *self.watch_ids.lock())
        };

        for id in watch_ids {
            if let Err(e) = self.store.unwatch(id) {
                warn!(watch_id = id, "release store watch failed: {:?}", e);
            }
        }
    }

    /// Closes the manager and waits for the watch loop to exit.
    pub async fn shutdown(&self) {
        self.close();
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("watch loop ended abnormally: {:?}", e);
            }
        }
    }
}

/// Node ids become a single key segment.
fn check_node_id(node_id: &str) -> Result<()> {
    if node_id.is_empty() {
        return Err(InputError::EmptyNodeId.into());
    }
    if node_id.contains(KEY_SEPARATOR) {
        return Err(InputError::InvalidNodeId(node_id.to_string()).into());
    }
    Ok(())
}

impl Drop for ConfigManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl ConfigCaller for ConfigManager {
    fn get_cluster_conf(&self) -> Result<ClusterConfig> {
        self.read_document(&self.keys.cluster_key())
    }

    fn set_cluster_conf(
        &self,
        conf: Option<&ClusterConfig>,
    ) -> Result<()> {
        let conf = conf.ok_or(InputError::MissingDocument)?;
        self.write_document(&self.keys.cluster_key(), conf)
    }

    fn get_node_conf(
        &self,
        node_id: &str,
    ) -> Result<NodeConfig> {
        check_node_id(node_id)?;
        self.read_document(&self.keys.node_key(node_id))
    }

    fn set_node_conf(
        &self,
        conf: &NodeConfig,
    ) -> Result<()> {
        check_node_id(&conf.node_id)?;
        self.write_document(&self.keys.node_key(&conf.node_id), conf)
    }

    fn delete_node_conf(
        &self,
        node_id: &str,
    ) -> Result<()> {
        check_node_id(node_id)?;
        {
            let _guard = self.bookkeeping.lock();
            self.ensure_open()?;
        }
        let key = self.keys.node_key(node_id);
        match self.store.delete(&key)? {
            Some(_) => {
                debug!(key = %key, "node document deleted");
                Ok(())
            }
            None => Err(StoreError::KeyNotFound(key).into()),
        }
    }

    fn enumerate_node_conf(&self) -> Result<NodesConfig> {
        self.ensure_open()?;
        let ids = self.store.enumerate_keys(&self.keys.node_prefix())?;
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            nodes.push(self.get_node_conf(&id)?);
        }
        Ok(NodesConfig(nodes))
    }
}
