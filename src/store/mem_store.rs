//! In-memory document store.
//!
//! ```text
//! Write Path:
//!   put()/delete() -> update map + send(event_queue) under the write lock
//!                                          ↓
//! Background Dispatcher Thread:
//!   event_queue.recv() -> match watchers by prefix -> callback(prefix, event)
//! ```
//!
//! Watch callbacks therefore never run on the writer's thread. TTLs are
//! honoured lazily: an expired key reads as absent and is skipped by
//! enumeration until it is overwritten.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::bounded;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::child_name;
use super::key_in_subtree;
use super::DocumentStore;
use super::KvAction;
use super::KvEvent;
use super::KvPair;
use super::WatchCallback;
use super::WatchId;
use crate::Result;
use crate::StoreError;

struct Entry {
    value: Vec<u8>,
    modified_index: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(
        &self,
        now: Instant,
    ) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

struct Watcher {
    prefix: String,
    after_index: u64,
    callback: WatchCallback,
}

struct MemStoreInner {
    data: RwLock<HashMap<String, Entry>>,
    watchers: DashMap<WatchId, Watcher>,
    next_index: AtomicU64,
    next_watch_id: AtomicU64,
}

pub struct MemStore {
    inner: Arc<MemStoreInner>,
    event_sender: Sender<KvEvent>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
}

impl std::fmt::Debug for MemStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("keys", &self.inner.data.read().len())
            .field("watchers", &self.inner.watchers.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Creates an empty store and starts its dispatcher thread.
    pub fn new() -> Self {
        let (event_sender, event_receiver) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let inner = Arc::new(MemStoreInner {
            data: RwLock::new(HashMap::new()),
            watchers: DashMap::new(),
            next_index: AtomicU64::new(1),
            next_watch_id: AtomicU64::new(1),
        });

        let dispatcher = inner.clone();
        std::thread::spawn(move || run_dispatcher(dispatcher, event_receiver, shutdown_rx));

        Self {
            inner,
            event_sender,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        }
    }

    fn next_index(&self) -> u64 {
        self.inner.next_index.fetch_add(1, Ordering::SeqCst)
    }

    fn notify(
        &self,
        event: KvEvent,
    ) {
        if self.inner.watchers.is_empty() {
            return;
        }
        if let Err(e) = self.event_sender.send(event) {
            warn!("mem store event queue closed: {:?}", e.0.pair.key);
        }
    }
}

fn run_dispatcher(
    inner: Arc<MemStoreInner>,
    receiver: Receiver<KvEvent>,
    shutdown_rx: Receiver<()>,
) {
    debug!("mem store dispatcher thread started");
    loop {
        crossbeam_channel::select! {
            recv(receiver) -> result => {
                match result {
                    Ok(event) => dispatch_event(&inner, event),
                    Err(_) => break,
                }
            }
            recv(shutdown_rx) -> _ => {
                debug!("mem store dispatcher received shutdown signal");
                break;
            }
        }
    }
    debug!("mem store dispatcher thread stopped");
}

fn dispatch_event(
    inner: &MemStoreInner,
    event: KvEvent,
) {
    // Collect first so no DashMap shard lock is held while callbacks run.
    let targets: Vec<(String, WatchCallback)> = inner
        .watchers
        .iter()
        .filter(|w| key_in_subtree(&event.pair.key, &w.prefix))
        .filter(|w| event.pair.modified_index > w.after_index)
        .map(|w| (w.prefix.clone(), w.callback.clone()))
        .collect();

    for (prefix, callback) in targets {
        trace!(key = %event.pair.key, prefix = %prefix, "deliver watch event");
        callback(&prefix, Ok(event.clone()));
    }
}

impl Drop for MemStore {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
    }
}

impl DocumentStore for MemStore {
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<KvPair>> {
        let now = Instant::now();
        let data = self.inner.data.read();
        Ok(data.get(key).filter(|e| e.is_live(now)).map(|e| KvPair {
            key: key.to_string(),
            value: e.value.clone(),
            modified_index: e.modified_index,
        }))
    }

    fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<KvPair> {
        let mut data = self.inner.data.write();
        let modified_index = self.next_index();
        data.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                modified_index,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        let pair = KvPair {
            key: key.to_string(),
            value,
            modified_index,
        };
        // Enqueued under the write lock so events leave in index order.
        self.notify(KvEvent {
            action: KvAction::Put,
            pair: pair.clone(),
        });
        Ok(pair)
    }

    fn delete(
        &self,
        key: &str,
    ) -> Result<Option<KvPair>> {
        let now = Instant::now();
        let mut data = self.inner.data.write();
        let removed = match data.remove(key) {
            Some(entry) if entry.is_live(now) => Some(KvPair {
                key: key.to_string(),
                value: entry.value,
                modified_index: self.next_index(),
            }),
            _ => None,
        };

        if let Some(pair) = &removed {
            self.notify(KvEvent {
                action: KvAction::Delete,
                pair: pair.clone(),
            });
        }
        Ok(removed)
    }

    fn enumerate_keys(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>> {
        let now = Instant::now();
        let data = self.inner.data.read();
        let names: BTreeSet<&str> = data
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .filter_map(|(k, _)| child_name(k, prefix))
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    fn watch_subtree(
        &self,
        prefix: &str,
        version: u64,
        callback: WatchCallback,
    ) -> Result<WatchId> {
        let id = self.inner.next_watch_id.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.insert(
            id,
            Watcher {
                prefix: prefix.to_string(),
                after_index: version,
                callback,
            },
        );
        debug!(watch_id = id, prefix = %prefix, "watch registered");
        Ok(id)
    }

    fn unwatch(
        &self,
        id: WatchId,
    ) -> Result<()> {
        match self.inner.watchers.remove(&id) {
            Some(_) => {
                debug!(watch_id = id, "watch removed");
                Ok(())
            }
            None => Err(StoreError::WatchNotFound(id).into()),
        }
    }
}
