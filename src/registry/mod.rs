//! Name-keyed callback table, one map per band.
//!
//! Readers take a lock-free snapshot of a band's map at the start of each
//! execution cycle; registrations swap in a new map under a write lock.


use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::Band;
use crate::ClusterConfig;
use crate::Document;
use crate::InputError;
use crate::NodeConfig;
use crate::RegistrationError;
use crate::Result;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = std::result::Result<(), HandlerError>;

pub type ClusterHandler =
    Arc<dyn Fn(ClusterConfig, CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub type NodeHandler =
    Arc<dyn Fn(NodeConfig, CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A subscriber callback. The variant decides which band it listens to.
///
/// Each invocation receives its own copy of the document and the token of
/// the current execution cycle. Handlers that run long should watch the
/// token; nothing forces them to stop.
#[derive(Clone)]
pub enum Handler {
    Cluster(ClusterHandler),
    Node(NodeHandler),
}

impl std::fmt::Debug for Handler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_tuple("Handler").field(&self.band()).finish()
    }
}

impl Handler {
    pub fn cluster<F, Fut>(f: F) -> Self
    where
        F: Fn(ClusterConfig, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::Cluster(Arc::new(
            move |doc: ClusterConfig, token: CancellationToken| -> BoxFuture<'static, HandlerResult> {
                Box::pin(f(doc, token))
            },
        ))
    }

    pub fn node<F, Fut>(f: F) -> Self
    where
        F: Fn(NodeConfig, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::Node(Arc::new(
            move |doc: NodeConfig, token: CancellationToken| -> BoxFuture<'static, HandlerResult> {
                Box::pin(f(doc, token))
            },
        ))
    }

    /// Wraps a synchronous cluster callback; it runs on the blocking pool.
    pub fn blocking_cluster<F>(f: F) -> Self
    where
        F: Fn(&ClusterConfig) -> HandlerResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Handler::cluster(move |doc, _token| {
            let f = f.clone();
            async move { run_blocking(move || f(&doc)).await }
        })
    }

    /// Wraps a synchronous node callback; it runs on the blocking pool.
    pub fn blocking_node<F>(f: F) -> Self
    where
        F: Fn(&NodeConfig) -> HandlerResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Handler::node(move |doc, _token| {
            let f = f.clone();
            async move { run_blocking(move || f(&doc)).await }
        })
    }

    pub fn band(&self) -> Band {
        match self {
            Handler::Cluster(_) => Band::Cluster,
            Handler::Node(_) => Band::Node,
        }
    }

    /// Starts one invocation with a private copy of `doc`.
    pub fn invoke(
        &self,
        doc: &Document,
        token: CancellationToken,
    ) -> BoxFuture<'static, HandlerResult> {
        match (self, doc) {
            (Handler::Cluster(h), Document::Cluster(c)) => h(c.clone(), token),
            (Handler::Node(h), Document::Node(n)) => h(n.clone(), token),
            (handler, doc) => {
                let msg = format!(
                    "{} handler cannot accept a {} document",
                    handler.band(),
                    doc.band()
                );
                let err: HandlerError = msg.into();
                Box::pin(async move { HandlerResult::Err(err) })
            }
        }
    }
}

async fn run_blocking<F>(f: F) -> HandlerResult
where
    F: FnOnce() -> HandlerResult + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(Box::new(e)),
    }
}

pub type HandlerSet = BTreeMap<String, Handler>;

#[derive(Debug, Default)]
pub struct CallbackRegistry {
    cluster: ArcSwap<HandlerSet>,
    node: ArcSwap<HandlerSet>,
    write_lock: Mutex<()>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn band_map(
        &self,
        band: Band,
    ) -> &ArcSwap<HandlerSet> {
        match band {
            Band::Cluster => &self.cluster,
            Band::Node => &self.node,
        }
    }

    /// Adds `handler` under `name` in the handler's band.
    ///
    /// A name already taken in that band is rejected and the existing
    /// handler stays in place.
    pub fn register(
        &self,
        name: &str,
        handler: Handler,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(InputError::EmptyCallbackName.into());
        }
        let band = handler.band();

        let _guard = self.write_lock.lock();
        let map = self.band_map(band);
        let current = map.load_full();
        if current.contains_key(name) {
            warn!(callback = %name, %band, "duplicate callback registration rejected");
            return Err(RegistrationError::Duplicate {
                name: name.to_string(),
                band,
            }
            .into());
        }

        let mut next = HandlerSet::clone(&current);
        next.insert(name.to_string(), handler);
        map.store(Arc::new(next));
        debug!(callback = %name, %band, "callback registered");
        Ok(())
    }

    /// Handlers of `band` as of now. Later registrations do not affect the snapshot.
    pub fn snapshot(
        &self,
        band: Band,
    ) -> Arc<HandlerSet> {
        self.band_map(band).load_full()
    }

    pub fn names(
        &self,
        band: Band,
    ) -> Vec<String> {
        self.snapshot(band).keys().cloned().collect()
    }

    pub fn len(
        &self,
        band: Band,
    ) -> usize {
        self.band_map(band).load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cluster.load().is_empty() && self.node.load().is_empty()
    }
}
