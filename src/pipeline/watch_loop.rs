use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ChangeJob;
use super::DrainBatch;
use super::JobHeap;
use super::LastAppliedLedger;
use crate::metrics::APPLY_DURATION_METRIC;
use crate::metrics::JOBS_APPLIED;
use crate::metrics::JOBS_DEDUPLICATED;
use crate::metrics::JOBS_DISCARDED;
use crate::metrics::JOBS_FAILED;
use crate::metrics::JOBS_STAGED;
use crate::time::duration_millis;
use crate::time::MonotonicClock;
use crate::Band;
use crate::Document;
use crate::ExecutionEngine;
use crate::KeySpace;
use crate::KvAction;
use crate::KvEvent;
use crate::Result;
use crate::StoreError;
use crate::WatchCallback;

/// Counters describing one drain of the job heap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Jobs popped off the heap
    pub drained: usize,
    /// Jobs superseded by a newer job for the same key in this drain
    pub deduplicated: usize,
    /// Jobs older than what the ledger already recorded
    pub discarded: usize,
    /// Jobs whose document was dispatched to handlers
    pub applied: usize,
    /// Delete jobs recorded in the ledger without dispatch
    pub deleted: usize,
    /// Jobs reported as failed applications
    pub failed: usize,
}

/// Stages watch events and applies them, one loop per manager.
#[derive(Debug)]
pub struct ChangePipeline {
    keys: KeySpace,
    heap: JobHeap,
    ledger: LastAppliedLedger,
    clock: MonotonicClock,
    trigger: Notify,
    engine: Arc<ExecutionEngine>,
    /// Held by the running loop; a second `run` returns immediately
    watch_lock: Mutex<()>,
    poll_interval: Duration,
    enable_metrics: bool,
}

impl ChangePipeline {
    pub fn new(
        keys: KeySpace,
        engine: Arc<ExecutionEngine>,
        poll_interval: Duration,
        enable_metrics: bool,
    ) -> Self {
        Self {
            keys,
            heap: JobHeap::new(),
            ledger: LastAppliedLedger::new(),
            clock: MonotonicClock::new(),
            trigger: Notify::new(),
            engine,
            watch_lock: Mutex::new(()),
            poll_interval,
            enable_metrics,
        }
    }

    pub fn ledger(&self) -> &LastAppliedLedger {
        &self.ledger
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Builds the store watch callback for `band`. It only stamps and stages
    /// the event, never waiting on handlers.
    pub fn watch_callback(
        self: &Arc<Self>,
        band: Band,
    ) -> WatchCallback {
        let pipeline = Arc::downgrade(self);
        Arc::new(move |prefix: &str, event: std::result::Result<KvEvent, StoreError>| {
            if let Some(pipeline) = pipeline.upgrade() {
                pipeline.stage_event(band, prefix, event);
            }
        })
    }

    /// Converts a raw watch event into a job and stages it.
    pub fn stage_event(
        &self,
        band: Band,
        prefix: &str,
        event: std::result::Result<KvEvent, StoreError>,
    ) {
        let timestamp = self.clock.stamp();
        let job = match event {
            Ok(event) => {
                if self.keys.band_of(&event.pair.key) != Some(band) {
                    trace!(key = %event.pair.key, %band, "ignore key outside band");
                    return;
                }
                match event.action {
                    KvAction::Put => ChangeJob::put(event.pair.key, event.pair.value, timestamp, band),
                    KvAction::Delete => ChangeJob::delete(event.pair.key, timestamp, band),
                }
            }
            Err(e) => {
                warn!(%prefix, %band, "watch delivered an error: {:?}", e);
                ChangeJob::failed(prefix, timestamp, band, e.to_string())
            }
        };
        self.stage(job);
    }

    /// Pushes `job` onto the heap and wakes the loop.
    pub fn stage(
        &self,
        job: ChangeJob,
    ) {
        trace!(key = %job.key, band = %job.band, ts = job.timestamp, "stage change job");
        if self.enable_metrics {
            JOBS_STAGED.with_label_values(&[job.band.as_str()]).inc();
        }
        self.heap.push(job);
        self.trigger.notify_one();
    }

    /// Forces a drain without waiting for the next poll tick.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Runs until `shutdown` is cancelled, draining on every trigger or tick.
    pub async fn run(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let _running = match self.watch_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("watch loop already running");
                return Ok(());
            }
        };

        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "watch loop started");
        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("watch loop stopped");
                    return Ok(());
                }
                _ = self.trigger.notified() => {
                    trace!("watch loop triggered");
                }
                _ = tick.tick() => {}
            }

            let report = self.drain_cycle(&shutdown).await;
            if report.drained > 0 {
                debug!(?report, "drain cycle finished");
            }
        }
    }

    /// Drains the heap once and applies the survivors, cluster band first.
    pub async fn drain_cycle(
        &self,
        shutdown: &CancellationToken,
    ) -> DrainReport {
        let jobs = self.heap.drain_all();
        let mut report = DrainReport {
            drained: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            return report;
        }

        let mut batch = DrainBatch::dedup(jobs);
        report.deduplicated = report.drained - batch.survivors();
        if self.enable_metrics {
            for band in [Band::Cluster, Band::Node] {
                let superseded = batch.superseded(band);
                if superseded > 0 {
                    JOBS_DEDUPLICATED
                        .with_label_values(&[band.as_str()])
                        .inc_by(superseded as u64);
                }
            }
        }

        for band in [Band::Cluster, Band::Node] {
            while let Some(job) = batch.pop(band) {
                if shutdown.is_cancelled() {
                    debug!("drain interrupted by shutdown");
                    return report;
                }
                self.apply(job, &mut report).await;
            }
        }
        report
    }

    async fn apply(
        &self,
        job: ChangeJob,
        report: &mut DrainReport,
    ) {
        let band = job.band;
        if !self.ledger.is_fresh(&job.key, job.timestamp) {
            self.discard(&job, report);
            return;
        }

        if let Some(reason) = &job.error {
            self.fail(&job, reason, report);
            return;
        }

        let doc = match job.action {
            KvAction::Delete => {
                if self.ledger.advance(&job.key, job.timestamp) {
                    debug!(key = %job.key, %band, "document deleted");
                    report.deleted += 1;
                } else {
                    self.discard(&job, report);
                }
                return;
            }
            KvAction::Put => match Document::decode(band, &job.value) {
                Ok(doc) => doc,
                Err(e) => {
                    self.fail(&job, &format!("decode {}: {}", job.key, e), report);
                    return;
                }
            },
        };

        if !self.ledger.advance(&job.key, job.timestamp) {
            self.discard(&job, report);
            return;
        }

        let started = Instant::now();
        match self.engine.run(doc) {
            Ok(cycle) => {
                self.engine.wait().await;
                report.applied += 1;
                let elapsed = started.elapsed();
                debug!(
                    key = %job.key,
                    %band,
                    cycle,
                    elapsed_ms = duration_millis(elapsed),
                    "change applied"
                );
                if self.enable_metrics {
                    JOBS_APPLIED.with_label_values(&[band.as_str()]).inc();
                    APPLY_DURATION_METRIC
                        .with_label_values(&[band.as_str()])
                        .observe(duration_millis(elapsed));
                }
            }
            Err(e) => {
                warn!(key = %job.key, %band, "engine refused change: {:?}", e);
            }
        }
    }

    fn discard(
        &self,
        job: &ChangeJob,
        report: &mut DrainReport,
    ) {
        trace!(
            key = %job.key,
            ts = job.timestamp,
            last = ?self.ledger.last_applied(&job.key),
            "discard stale change"
        );
        report.discarded += 1;
        if self.enable_metrics {
            JOBS_DISCARDED.with_label_values(&[job.band.as_str()]).inc();
        }
    }

    fn fail(
        &self,
        job: &ChangeJob,
        reason: &str,
        report: &mut DrainReport,
    ) {
        self.engine.fail_cycle(job.band, reason);
        report.failed += 1;
        if self.enable_metrics {
            JOBS_FAILED.with_label_values(&[job.band.as_str()]).inc();
        }
    }
}
