//! Configuration Manager Error Hierarchy
//!
//! Defines the error types surfaced by the document facade, the store
//! adapters, the callback registry and the execution engine.

use config::ConfigError;

use crate::Band;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or empty required arguments
    #[error(transparent)]
    Input(#[from] InputError),

    /// Key-value store failures, propagated unchanged to the facade caller
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Callback registration conflicts
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// At least one callback of the last execution cycle failed
    #[error("Callback execution failed: {failed:?}")]
    Execution { failed: Vec<String> },

    /// Manager settings loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Returned by the null facade for every operation
    #[error("Operation not implemented")]
    NotImplemented,

    /// Operation attempted on a manager that has been closed
    #[error("Config manager is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Input document is missing")]
    MissingDocument,

    #[error("Node id must not be empty")]
    EmptyNodeId,

    #[error("Node id {0:?} must not contain '/'")]
    InvalidNodeId(String),

    #[error("Callback name must not be empty")]
    EmptyCallbackName,

    #[error("No route for {method} {path}")]
    NoRoute { method: String, path: String },

    #[error("Malformed input document: {0}")]
    MalformedDocument(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Requested key does not exist
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Backend database failures
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Document could not be encoded or decoded
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Unknown watch registration id
    #[error("Watch {0} is not registered")]
    WatchNotFound(u64),

    /// Store has been shut down
    #[error("Store is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Callback {name} is already registered for {band} changes")]
    Duplicate { name: String, band: Band },
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Store(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Store(StoreError::Serialization(e))
    }
}

impl Error {
    /// True when the error reports a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(StoreError::KeyNotFound(_)))
    }
}
