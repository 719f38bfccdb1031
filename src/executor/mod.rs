//! Execution engine: runs one band's handlers for one document, concurrently.
//!
//! Every `run` starts a new cycle with its own cancellation token derived from
//! the manager's root token. Status is tracked per cycle; completions from an
//! abandoned cycle are dropped.


use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::metrics::CALLBACK_EXECUTIONS;
use crate::time::duration_millis;
use crate::Band;
use crate::CallbackRegistry;
use crate::Document;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    Running,
    Succeeded,
    Failed(String),
}

impl ExecStatus {
    fn label(&self) -> &'static str {
        match self {
            ExecStatus::Running => "running",
            ExecStatus::Succeeded => "succeeded",
            ExecStatus::Failed(_) => "failed",
        }
    }
}

/// Outcome of one handler in the most recent cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackStatus {
    pub status: ExecStatus,
    /// Time the handler took; `None` while running or when it never ran
    pub duration: Option<Duration>,
}

impl CallbackStatus {
    fn running() -> Self {
        Self {
            status: ExecStatus::Running,
            duration: None,
        }
    }
}

#[derive(Debug, Default)]
struct StatusTable {
    cycle: u64,
    entries: HashMap<String, CallbackStatus>,
}

struct Cycle {
    id: u64,
    token: CancellationToken,
    /// Number of handlers of this cycle still running
    remaining: watch::Receiver<usize>,
}

pub struct ExecutionEngine {
    registry: Arc<CallbackRegistry>,
    root: CancellationToken,
    cycle: Mutex<Cycle>,
    status: Arc<Mutex<StatusTable>>,
    enable_metrics: bool,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("cycle", &self.cycle.lock().id)
            .field("closed", &self.root.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<CallbackRegistry>,
        root: CancellationToken,
        enable_metrics: bool,
    ) -> Self {
        let (_, remaining) = watch::channel(0);
        let token = root.child_token();
        Self {
            registry,
            root,
            cycle: Mutex::new(Cycle {
                id: 0,
                token,
                remaining,
            }),
            status: Arc::new(Mutex::new(StatusTable::default())),
            enable_metrics,
        }
    }

    /// Starts every handler registered for the document's band and returns
    /// the new cycle id without waiting for them.
    pub fn run(
        &self,
        doc: Document,
    ) -> Result<u64> {
        if self.root.is_cancelled() {
            return Err(Error::Closed);
        }
        let band = doc.band();
        let handlers = self.registry.snapshot(band);

        let mut cycle = self.cycle.lock();
        let id = cycle.id + 1;
        let token = self.root.child_token();
        let (remaining_tx, remaining) = watch::channel(handlers.len());
        let remaining_tx = Arc::new(remaining_tx);

        {
            let mut status = self.status.lock();
            status.cycle = id;
            status.entries = handlers
                .keys()
                .map(|name| (name.clone(), CallbackStatus::running()))
                .collect();
        }

        debug!(cycle = id, %band, handlers = handlers.len(), "start execution cycle");
        *cycle = Cycle {
            id,
            token: token.clone(),
            remaining,
        };
        drop(cycle);

        let doc = Arc::new(doc);
        for (name, handler) in handlers.iter() {
            let handler = handler.clone();
            let doc = doc.clone();
            let handler_token = token.clone();
            let name = name.clone();
            let status = self.status.clone();
            let remaining_tx = remaining_tx.clone();
            let enable_metrics = self.enable_metrics;

            // The handler is only entered from inside the task, so neither a
            // panic nor a call back into the engine can reach the cycle lock.
            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| {
                    handler.invoke(&doc, handler_token)
                })) {
                    Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(Ok(())) => ExecStatus::Succeeded,
                        Ok(Err(e)) => ExecStatus::Failed(e.to_string()),
                        Err(_) => ExecStatus::Failed("callback panicked".to_string()),
                    },
                    Err(_) => ExecStatus::Failed("callback panicked".to_string()),
                };
                let elapsed = started.elapsed();

                match &outcome {
                    ExecStatus::Failed(reason) => {
                        warn!(cycle = id, callback = %name, %band, %reason, "callback failed")
                    }
                    _ => trace!(
                        cycle = id,
                        callback = %name,
                        elapsed_ms = duration_millis(elapsed),
                        "callback finished"
                    ),
                }
                if enable_metrics {
                    CALLBACK_EXECUTIONS
                        .with_label_values(&[band.as_str(), outcome.label()])
                        .inc();
                }

                {
                    let mut status = status.lock();
                    if status.cycle == id {
                        status.entries.insert(
                            name,
                            CallbackStatus {
                                status: outcome,
                                duration: Some(elapsed),
                            },
                        );
                    }
                }
                remaining_tx.send_modify(|n| *n = n.saturating_sub(1));
            });
        }
        Ok(id)
    }

    /// Starts a cycle in which every handler of `band` is recorded as failed
    /// with `reason` and none is invoked.
    pub fn fail_cycle(
        &self,
        band: Band,
        reason: &str,
    ) -> u64 {
        let handlers = self.registry.snapshot(band);
        let mut cycle = self.cycle.lock();
        let id = cycle.id + 1;
        let (_, remaining) = watch::channel(0);

        {
            let mut status = self.status.lock();
            status.cycle = id;
            status.entries = handlers
                .keys()
                .map(|name| {
                    (
                        name.clone(),
                        CallbackStatus {
                            status: ExecStatus::Failed(reason.to_string()),
                            duration: None,
                        },
                    )
                })
                .collect();
        }
        if self.enable_metrics {
            CALLBACK_EXECUTIONS
                .with_label_values(&[band.as_str(), "failed"])
                .inc_by(handlers.len() as u64);
        }
        warn!(cycle = id, %band, %reason, "change could not be applied");

        *cycle = Cycle {
            id,
            token: self.root.child_token(),
            remaining,
        };
        id
    }

    /// Returns once every handler of the latest cycle has finished, or as
    /// soon as that cycle is aborted or the engine closed. Handlers still
    /// running at that point are left to finish in the background.
    pub async fn wait(&self) {
        let (id, token, mut remaining) = {
            let cycle = self.cycle.lock();
            (cycle.id, cycle.token.clone(), cycle.remaining.clone())
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(cycle = id, "stopped waiting on cancelled cycle");
            }
            _ = async { remaining.wait_for(|n| *n == 0).await.map(|_| ()) } => {
                trace!(cycle = id, "execution cycle complete");
            }
        }
    }

    /// Cancels the current cycle. The next `run` gets a fresh token.
    pub fn abort(&self) {
        let cycle = self.cycle.lock();
        info!(cycle = cycle.id, "abort execution cycle");
        cycle.token.cancel();
    }

    /// Cancels the root token. No cycle can start afterwards.
    pub fn close(&self) {
        self.root.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn current_cycle(&self) -> u64 {
        self.cycle.lock().id
    }

    /// Snapshot of the per-handler outcomes of the latest cycle.
    pub fn get_status(&self) -> HashMap<String, CallbackStatus> {
        self.status.lock().entries.clone()
    }

    /// Fails with the names of the handlers that failed in the latest cycle.
    pub fn error(&self) -> Result<()> {
        let status = self.status.lock();
        let mut failed: Vec<String> = status
            .entries
            .iter()
            .filter(|(_, s)| matches!(s.status, ExecStatus::Failed(_)))
            .map(|(name, _)| name.clone())
            .collect();
        if failed.is_empty() {
            return Ok(());
        }
        failed.sort();
        Err(Error::Execution { failed })
    }
}
