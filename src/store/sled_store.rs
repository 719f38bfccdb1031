//! Document store backed by an embedded sled tree.
//!
//! Each stored record is the 8 byte big-endian modification index followed by
//! the raw value. Watches use `Tree::watch_prefix` with one delivery thread per
//! registration; the thread wakes periodically to notice `unwatch`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;
use tracing::warn;

use super::child_name;
use super::key_in_subtree;
use super::DocumentStore;
use super::KvAction;
use super::KvEvent;
use super::KvPair;
use super::WatchCallback;
use super::WatchId;
use crate::constants::SLED_TREE_NAME;
use crate::constants::SLED_WATCH_POLL_MS;
use crate::Result;
use crate::StoreError;

const INDEX_LEN: usize = 8;

struct WatchWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
    workers: DashMap<WatchId, WatchWorker>,
    next_watch_id: AtomicU64,
}

impl std::fmt::Debug for SledStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("tree", &SLED_TREE_NAME)
            .field("watchers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl SledStore {
    /// Opens (or creates) the database under `db_root_dir`.
    pub fn open(db_root_dir: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        debug!("open sled store at: {:?}", &db_root_dir);
        let db = sled::Config::default()
            .path(db_root_dir.as_ref())
            .use_compression(true)
            .compression_factor(1)
            .open()
            .map_err(|e| {
                warn!("Try to open DB at this location: {:?} and failed: {:?}", db_root_dir, e);
                StoreError::from(e)
            })?;
        Self::from_db(db)
    }

    /// Opens a throwaway database removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(SLED_TREE_NAME)?;
        Ok(Self {
            db,
            tree,
            workers: DashMap::new(),
            next_watch_id: AtomicU64::new(1),
        })
    }

    fn decode_record(
        key: &str,
        record: &[u8],
    ) -> std::result::Result<KvPair, StoreError> {
        if record.len() < INDEX_LEN {
            return Err(StoreError::Backend(format!(
                "record for {} is {} bytes, shorter than its index header",
                key,
                record.len()
            )));
        }
        let (index, value) = record.split_at(INDEX_LEN);
        let mut buf = [0u8; INDEX_LEN];
        buf.copy_from_slice(index);
        Ok(KvPair {
            key: key.to_string(),
            value: value.to_vec(),
            modified_index: u64::from_be_bytes(buf),
        })
    }

    fn to_event(event: sled::Event) -> std::result::Result<KvEvent, StoreError> {
        match event {
            sled::Event::Insert { key, value } => {
                let key = String::from_utf8_lossy(&key).into_owned();
                let pair = Self::decode_record(&key, &value)?;
                Ok(KvEvent {
                    action: KvAction::Put,
                    pair,
                })
            }
            sled::Event::Remove { key } => Ok(KvEvent {
                action: KvAction::Delete,
                pair: KvPair {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    value: Vec::new(),
                    modified_index: 0,
                },
            }),
        }
    }

    fn stop_worker(mut worker: WatchWorker) {
        worker.stop.store(true, Ordering::Release);
        if let Some(handle) = worker.handle.take() {
            // The delivery thread may be the caller when a callback unwatches.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for SledStore {
    fn drop(&mut self) {
        let ids: Vec<WatchId> = self.workers.iter().map(|w| *w.key()).collect();
        for id in ids {
            if let Some((_, worker)) = self.workers.remove(&id) {
                Self::stop_worker(worker);
            }
        }
        if let Err(e) = self.db.flush() {
            warn!("flush sled store on drop failed: {:?}", e);
        }
    }
}

impl DocumentStore for SledStore {
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<KvPair>> {
        match self.tree.get(key.as_bytes())? {
            Some(record) => Ok(Some(Self::decode_record(key, &record)?)),
            None => Ok(None),
        }
    }

    fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<KvPair> {
        if let Some(ttl) = ttl {
            warn!(key = %key, ?ttl, "sled store has no key expiry; ttl ignored");
        }
        let modified_index = self.db.generate_id()? + 1;
        let mut record = Vec::with_capacity(INDEX_LEN + value.len());
        record.extend_from_slice(&modified_index.to_be_bytes());
        record.extend_from_slice(&value);
        self.tree.insert(key.as_bytes(), record)?;

        Ok(KvPair {
            key: key.to_string(),
            value,
            modified_index,
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Result<Option<KvPair>> {
        match self.tree.remove(key.as_bytes())? {
            Some(record) => Ok(Some(Self::decode_record(key, &record)?)),
            None => Ok(None),
        }
    }

    fn enumerate_keys(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for item in self.tree.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key);
            if let Some(name) = child_name(&key, prefix) {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    fn watch_subtree(
        &self,
        prefix: &str,
        version: u64,
        callback: WatchCallback,
    ) -> Result<WatchId> {
        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let mut subscriber = self.tree.watch_prefix(prefix.as_bytes());
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stop = stop.clone();
        let thread_prefix = prefix.to_string();
        let handle = std::thread::spawn(move || {
            debug!(watch_id = id, prefix = %thread_prefix, "sled watch thread started");
            let poll = Duration::from_millis(SLED_WATCH_POLL_MS);
            while !thread_stop.load(Ordering::Acquire) {
                let event = match subscriber.next_timeout(poll) {
                    Ok(event) => event,
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                };
                if thread_stop.load(Ordering::Acquire) {
                    break;
                }
                match Self::to_event(event) {
                    Ok(event) => {
                        if !key_in_subtree(&event.pair.key, &thread_prefix) {
                            continue;
                        }
                        if event.action == KvAction::Put && event.pair.modified_index <= version {
                            continue;
                        }
                        callback(&thread_prefix, Ok(event));
                    }
                    Err(e) => callback(&thread_prefix, Err(e)),
                }
            }
            debug!(watch_id = id, "sled watch thread stopped");
        });

        self.workers.insert(
            id,
            WatchWorker {
                stop,
                handle: Some(handle),
            },
        );
        Ok(id)
    }

    fn unwatch(
        &self,
        id: WatchId,
    ) -> Result<()> {
        match self.workers.remove(&id) {
            Some((_, worker)) => {
                Self::stop_worker(worker);
                Ok(())
            }
            None => Err(StoreError::WatchNotFound(id).into()),
        }
    }
}
