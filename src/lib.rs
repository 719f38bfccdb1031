//! Distributed configuration manager.
//!
//! Cluster-wide and per-node configuration documents live in a key-value
//! store. A [`ConfigManager`] exposes CRUD on those documents, watches their
//! keys and fans every applied change out to the callbacks registered for
//! its band.
//!
//! ```text
//! DocumentStore --watch--> ChangePipeline --run/wait--> ExecutionEngine
//!       ^                  (heap, dedup,                (per-cycle token,
//!       |                   ledger gate)                 status table)
//! ConfigManager (CRUD, register, status, abort, close)  CallbackRegistry
//! ```

mod config;
pub mod constants;
mod document;
mod errors;
mod executor;
mod manager;
pub mod metrics;
mod pipeline;
mod registry;
mod store;
pub mod utils;

pub use config::*;
pub use document::*;
pub use errors::*;
pub use executor::*;
pub use manager::*;
pub use pipeline::*;
pub use registry::*;
pub use store::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
