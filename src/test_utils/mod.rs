//! Helpers shared by the unit tests of every module
use std::time::Duration;
use std::time::Instant;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Polls `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(
    timeout: Duration,
    cond: F,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
