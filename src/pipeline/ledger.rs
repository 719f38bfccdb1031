use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Per-key timestamp of the last change handed to handlers.
///
/// An entry only ever moves forward. Not persisted: a restarted manager
/// starts from an empty ledger.
#[derive(Debug, Default)]
pub struct LastAppliedLedger {
    applied: DashMap<String, i64>,
}

impl LastAppliedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `timestamp` for `key` if it is strictly newer than the stored one.
    ///
    /// Returns false, leaving the ledger untouched, for stale or replayed stamps.
    pub fn advance(
        &self,
        key: &str,
        timestamp: i64,
    ) -> bool {
        match self.applied.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                if timestamp > *e.get() {
                    e.insert(timestamp);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(e) => {
                e.insert(timestamp);
                true
            }
        }
    }

    pub fn is_fresh(
        &self,
        key: &str,
        timestamp: i64,
    ) -> bool {
        self.applied.get(key).map_or(true, |last| timestamp > *last)
    }

    pub fn last_applied(
        &self,
        key: &str,
    ) -> Option<i64> {
        self.applied.get(key).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
