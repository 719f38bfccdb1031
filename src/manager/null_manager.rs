use super::ConfigCaller;
use crate::ClusterConfig;
use crate::Error;
use crate::NodeConfig;
use crate::NodesConfig;
use crate::Result;

/// Facade placeholder for deployments without a config store.
/// Every operation fails with `Error::NotImplemented`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConfigCaller;

impl ConfigCaller for NullConfigCaller {
    fn get_cluster_conf(&self) -> Result<ClusterConfig> {
        Err(Error::NotImplemented)
    }

    fn set_cluster_conf(
        &self,
        _conf: Option<&ClusterConfig>,
    ) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn get_node_conf(
        &self,
        _node_id: &str,
    ) -> Result<NodeConfig> {
        Err(Error::NotImplemented)
    }

    fn set_node_conf(
        &self,
        _conf: &NodeConfig,
    ) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn delete_node_conf(
        &self,
        _node_id: &str,
    ) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn enumerate_node_conf(&self) -> Result<NodesConfig> {
        Err(Error::NotImplemented)
    }
}
