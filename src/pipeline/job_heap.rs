use std::collections::BinaryHeap;
use std::collections::HashMap;

use parking_lot::Mutex;

use super::job::ByRecency;
use super::ChangeJob;
use crate::Band;

/// Pending change jobs, most recent first.
///
/// Shared between the store's watch callback (producer) and the watch loop
/// (consumer). The lock is only held for a push or a full drain.
#[derive(Debug, Default)]
pub struct JobHeap {
    heap: Mutex<BinaryHeap<ByRecency>>,
}

impl JobHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        job: ChangeJob,
    ) {
        self.heap.lock().push(ByRecency(job));
    }

    /// Pops every pending job, most recent first.
    pub fn drain_all(&self) -> Vec<ChangeJob> {
        let heap = std::mem::take(&mut *self.heap.lock());
        heap.into_sorted_vec().into_iter().rev().map(|j| j.0).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

/// Survivors of one drain after per-key dedup, split by band.
#[derive(Debug, Default)]
pub struct DrainBatch {
    /// Jobs popped before dedup
    pub drained: usize,
    cluster: BinaryHeap<ByRecency>,
    node: BinaryHeap<ByRecency>,
    superseded: HashMap<Band, usize>,
}

impl DrainBatch {
    /// Keeps only the newest job per key and rebuilds one heap per band.
    pub fn dedup(jobs: Vec<ChangeJob>) -> Self {
        let drained = jobs.len();
        let mut latest: HashMap<(Band, String), ChangeJob> = HashMap::with_capacity(drained);
        let mut superseded: HashMap<Band, usize> = HashMap::new();
        for job in jobs {
            let band = job.band;
            let slot = (band, job.key.clone());
            match latest.get(&slot) {
                Some(kept) if kept.timestamp >= job.timestamp => {
                    *superseded.entry(band).or_default() += 1;
                }
                _ => {
                    if latest.insert(slot, job).is_some() {
                        *superseded.entry(band).or_default() += 1;
                    }
                }
            }
        }

        let mut batch = DrainBatch {
            drained,
            superseded,
            ..Default::default()
        };
        for job in latest.into_values() {
            match job.band {
                Band::Cluster => batch.cluster.push(ByRecency(job)),
                Band::Node => batch.node.push(ByRecency(job)),
            }
        }
        batch
    }

    pub fn survivors(&self) -> usize {
        self.cluster.len() + self.node.len()
    }

    /// Jobs of `band` dropped in favor of a newer job for the same key.
    pub fn superseded(
        &self,
        band: Band,
    ) -> usize {
        self.superseded.get(&band).copied().unwrap_or(0)
    }

    /// Next job of `band` in recency order.
    pub fn pop(
        &mut self,
        band: Band,
    ) -> Option<ChangeJob> {
        let heap = match band {
            Band::Cluster => &mut self.cluster,
            Band::Node => &mut self.node,
        };
        heap.pop().map(|j| j.0)
    }
}
