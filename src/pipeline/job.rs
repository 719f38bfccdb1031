use std::cmp::Ordering;

use crate::Band;
use crate::KvAction;

/// One raw change observed on the store, stamped on arrival.
///
/// Immutable once created; handlers receive their own decoded copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeJob {
    pub key: String,
    pub value: Vec<u8>,
    pub timestamp: i64,
    pub band: Band,
    pub action: KvAction,
    /// Set when the store reported a failure instead of a change
    pub error: Option<String>,
}

impl ChangeJob {
    pub fn put(
        key: impl Into<String>,
        value: Vec<u8>,
        timestamp: i64,
        band: Band,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
            band,
            action: KvAction::Put,
            error: None,
        }
    }

    pub fn delete(
        key: impl Into<String>,
        timestamp: i64,
        band: Band,
    ) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            timestamp,
            band,
            action: KvAction::Delete,
            error: None,
        }
    }

    pub fn failed(
        key: impl Into<String>,
        timestamp: i64,
        band: Band,
        error: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            timestamp,
            band,
            action: KvAction::Put,
            error: Some(error.into()),
        }
    }
}

/// Heap ordering wrapper: the most recent job compares greatest.
#[derive(Debug, Clone)]
pub(crate) struct ByRecency(pub ChangeJob);

impl PartialEq for ByRecency {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.0.timestamp == other.0.timestamp
    }
}

impl Eq for ByRecency {}

impl Ord for ByRecency {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.0.timestamp.cmp(&other.0.timestamp)
    }
}

impl PartialOrd for ByRecency {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
