//! Configuration documents stored in the key-value store.
//!
//! Documents are serialized as JSON. Every field is optional on the wire so
//! that partially populated documents written by other tools still decode.

mod cluster;
mod keys;
mod node;
mod overlay;
pub use cluster::*;
pub use keys::*;
pub use node::*;
pub use overlay::*;


use std::fmt;

/// Which family of subscribers a change belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    Cluster,
    Node,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Cluster => "cluster",
            Band::Node => "node",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded document tagged with its band
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Cluster(ClusterConfig),
    Node(NodeConfig),
}

impl Document {
    pub fn band(&self) -> Band {
        match self {
            Document::Cluster(_) => Band::Cluster,
            Document::Node(_) => Band::Node,
        }
    }

    /// Decodes a raw store value as the document type of `band`.
    pub fn decode(
        band: Band,
        value: &[u8],
    ) -> std::result::Result<Self, serde_json::Error> {
        match band {
            Band::Cluster => serde_json::from_slice(value).map(Document::Cluster),
            Band::Node => serde_json::from_slice(value).map(Document::Node),
        }
    }
}

pub(crate) fn is_false(v: &bool) -> bool {
    !*v
}

pub(crate) fn is_zero(v: &i32) -> bool {
    *v == 0
}

pub(crate) fn is_absent(v: &Option<serde_json::Value>) -> bool {
    matches!(v, None | Some(serde_json::Value::Null))
}
