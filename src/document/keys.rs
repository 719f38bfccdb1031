use super::Band;
use crate::constants::CLUSTER_CONF_KEY;
use crate::constants::KEY_SEPARATOR;
use crate::constants::NODE_CONF_KEY;

/// Maps documents to their slash-delimited store keys under one root.
///
/// `<root>/clusterConf` holds the cluster document and
/// `<root>/nodeConf/<node_id>` holds each node document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    root: String,
}

impl KeySpace {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let root = root.trim_matches(KEY_SEPARATOR).to_string();
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn cluster_key(&self) -> String {
        format!("{}{}{}", self.root, KEY_SEPARATOR, CLUSTER_CONF_KEY)
    }

    pub fn node_prefix(&self) -> String {
        format!("{}{}{}", self.root, KEY_SEPARATOR, NODE_CONF_KEY)
    }

    pub fn node_key(
        &self,
        node_id: &str,
    ) -> String {
        format!("{}{}{}", self.node_prefix(), KEY_SEPARATOR, node_id)
    }

    /// Classifies a store key, returning `None` for keys outside this keyspace.
    /// Keys nested below a node document are outside it too.
    pub fn band_of(
        &self,
        key: &str,
    ) -> Option<Band> {
        if key == self.cluster_key() {
            return Some(Band::Cluster);
        }
        let node_prefix = self.node_prefix();
        let rest = key.strip_prefix(&node_prefix)?;
        match rest.strip_prefix(KEY_SEPARATOR) {
            Some(id) if !id.is_empty() && !id.contains(KEY_SEPARATOR) => Some(Band::Node),
            _ => None,
        }
    }
}
