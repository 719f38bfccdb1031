//! Change pipeline: stage raw watch events, drain and dedupe them per key,
//! gate them on the last-applied ledger and hand survivors to the engine.
//!
//! ```text
//! store watch thread:  event -> stamp -> JobHeap.push -> trigger
//!                                             ↓
//! watch loop:  (trigger | poll tick) -> drain -> dedup per key
//!                 -> cluster band, then node band, newest first
//!                 -> ledger gate -> engine.run -> engine.wait
//! ```

mod job;
mod job_heap;
mod ledger;
mod watch_loop;
pub use job::ChangeJob;
pub use job_heap::*;
pub use ledger::*;
pub use watch_loop::*;

#[cfg(test)]
mod job_heap_test;
