//! Document store boundary.
//!
//! A thin interface over the key-value store primitives the manager needs:
//! get/put/delete, child-key enumeration and subtree watches. Two adapters
//! ship with the crate, an in-memory map and an embedded sled database.

mod mem_store;
mod sled_store;
pub use mem_store::*;
pub use sled_store::*;


use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::constants::KEY_SEPARATOR;
use crate::Result;
use crate::StoreError;

/// A stored value with the store-wide modification index of its last write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
    pub modified_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvAction {
    Put,
    Delete,
}

/// A change observed under a watched prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEvent {
    pub action: KvAction,
    pub pair: KvPair,
}

pub type WatchId = u64;

/// Invoked with the watched prefix and the change, or the error the store hit
/// while delivering it. Must return quickly.
pub type WatchCallback = Arc<dyn Fn(&str, std::result::Result<KvEvent, StoreError>) + Send + Sync>;

/// Key-value operations used by the configuration manager.
///
/// Implementations must be safe for concurrent use. Watch callbacks run on a
/// store-owned thread, at least once per change, with no ordering guarantee.
#[cfg_attr(test, automock)]
pub trait DocumentStore: Send + Sync + 'static {
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<KvPair>>;

    /// Writes `value`, replacing any previous one. A `ttl` asks the store to
    /// forget the key after that long.
    fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<KvPair>;

    /// Removes `key`, returning the pair that was removed if it existed.
    fn delete(
        &self,
        key: &str,
    ) -> Result<Option<KvPair>>;

    /// Lists the immediate child names below `prefix`, sorted.
    fn enumerate_keys(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>>;

    /// Delivers every change under `prefix` whose modification index is
    /// greater than `version` to `callback`. Version 0 means all future changes.
    fn watch_subtree(
        &self,
        prefix: &str,
        version: u64,
        callback: WatchCallback,
    ) -> Result<WatchId>;

    fn unwatch(
        &self,
        id: WatchId,
    ) -> Result<()>;
}

/// True when `key` is `prefix` itself or lies below it.
pub(crate) fn key_in_subtree(
    key: &str,
    prefix: &str,
) -> bool {
    match key.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_SEPARATOR),
        None => false,
    }
}

/// Returns the first path segment of `key` below `prefix`, if any.
pub(crate) fn child_name<'a>(
    key: &'a str,
    prefix: &str,
) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?.strip_prefix(KEY_SEPARATOR)?;
    rest.split(KEY_SEPARATOR).next().filter(|s| !s.is_empty())
}
