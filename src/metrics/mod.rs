
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;

lazy_static! {
    pub static ref JOBS_STAGED: IntCounterVec = IntCounterVec::new(
        Opts::new("jobs_staged", "Change jobs pushed onto the job heap"),
        &["band"]
    )
    .expect("metric can not be created");

    pub static ref JOBS_DEDUPLICATED: IntCounterVec = IntCounterVec::new(
        Opts::new("jobs_deduplicated", "Change jobs superseded by a newer job for the same key within one drain"),
        &["band"]
    )
    .expect("metric can not be created");

    pub static ref JOBS_DISCARDED: IntCounterVec = IntCounterVec::new(
        Opts::new("jobs_discarded", "Change jobs dropped because a newer change was already applied"),
        &["band"]
    )
    .expect("metric can not be created");

    pub static ref JOBS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("jobs_applied", "Change jobs handed to the execution engine"),
        &["band"]
    )
    .expect("metric can not be created");

    pub static ref JOBS_FAILED: IntCounterVec = IntCounterVec::new(
        Opts::new("jobs_failed", "Change jobs that carried a store error or an undecodable document"),
        &["band"]
    )
    .expect("metric can not be created");

    pub static ref CALLBACK_EXECUTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("callback_executions", "Callback invocations by outcome"),
        &["band", "result"]
    )
    .expect("metric can not be created");

    pub static ref APPLY_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("apply_duration_ms", "Time from dispatch to cycle completion in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets")),
        &["band"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("clusterconf".to_string()), None).expect("registry can be created");
}

/// Registers every pipeline collector with `registry`.
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(JOBS_STAGED.clone()))?;
    registry.register(Box::new(JOBS_DEDUPLICATED.clone()))?;
    registry.register(Box::new(JOBS_DISCARDED.clone()))?;
    registry.register(Box::new(JOBS_APPLIED.clone()))?;
    registry.register(Box::new(JOBS_FAILED.clone()))?;
    registry.register(Box::new(CALLBACK_EXECUTIONS.clone()))?;
    registry.register(Box::new(APPLY_DURATION_METRIC.clone()))?;
    Ok(())
}

/// Registers the pipeline collectors with [`struct@REGISTRY`]. Only the first
/// call has an effect.
pub fn init_default_registry() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Err(e) = register_custom_metrics(&REGISTRY) {
            error!("register pipeline metrics failed: {}", e);
        }
    });
}

/// Renders `registry` in the prometheus text exposition format.
pub fn gather_text(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
