//! Route table of the configuration REST surface.
//!
//! Only the mapping is provided: `dispatch` resolves a method and path to a
//! facade operation and runs it against any `ConfigCaller`. Serving HTTP is
//! left to the host.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::ConfigCaller;
use crate::ClusterConfig;
use crate::InputError;
use crate::NodeConfig;
use crate::Result;

/// Path segment that captures a node id
pub const NODE_ID_PARAM: &str = "{id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOperation {
    GetClusterConf,
    GetNodeConf,
    EnumerateNodeConf,
    /// Full replacement
    SetClusterConf,
    /// Full replacement
    SetNodeConf,
    /// Partial overlay onto the stored document
    UpdateClusterConf,
    /// Partial overlay onto the stored document
    UpdateNodeConf,
    DeleteNodeConf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub operation: RouteOperation,
}

impl Route {
    fn new(
        method: Method,
        path: &str,
        operation: RouteOperation,
    ) -> Self {
        Self {
            method,
            path: path.to_string(),
            operation,
        }
    }

    /// Matches `path` against this route's pattern. On a match, returns the
    /// captured node id when the pattern has one.
    fn capture<'a>(
        &self,
        path: &'a str,
    ) -> Option<Option<&'a str>> {
        let mut pattern = self.path.trim_matches('/').split('/');
        let mut segments = path.trim_matches('/').split('/');
        let mut captured = None;
        loop {
            match (pattern.next(), segments.next()) {
                (None, None) => return Some(captured),
                (Some(NODE_ID_PARAM), Some(segment)) if !segment.is_empty() => {
                    captured = Some(segment);
                }
                (Some(p), Some(segment)) if p == segment => {}
                _ => return None,
            }
        }
    }
}

pub fn routes() -> Vec<Route> {
    vec![
        Route::new(Method::Get, "/config/cluster", RouteOperation::GetClusterConf),
        Route::new(Method::Get, "/config/node/{id}", RouteOperation::GetNodeConf),
        Route::new(Method::Get, "/config/enumerate", RouteOperation::EnumerateNodeConf),
        Route::new(Method::Put, "/config/cluster", RouteOperation::SetClusterConf),
        Route::new(Method::Put, "/config/node", RouteOperation::SetNodeConf),
        Route::new(Method::Post, "/config/cluster", RouteOperation::UpdateClusterConf),
        Route::new(Method::Post, "/config/node", RouteOperation::UpdateNodeConf),
        Route::new(Method::Delete, "/config/node/{id}", RouteOperation::DeleteNodeConf),
    ]
}

/// Resolves a request to its operation and the captured node id, if any.
pub fn resolve(
    method: Method,
    path: &str,
) -> Result<(RouteOperation, Option<String>)> {
    routes()
        .iter()
        .filter(|route| route.method == method)
        .find_map(|route| {
            route
                .capture(path)
                .map(|id| (route.operation, id.map(str::to_string)))
        })
        .ok_or_else(|| {
            InputError::NoRoute {
                method: method.to_string(),
                path: path.to_string(),
            }
            .into()
        })
}

/// Runs the operation routed by `method` and `path` against `caller`.
///
/// Reads return the document as JSON, writes and deletes return
/// `Value::Null`, partial updates return the merged document.
pub fn dispatch(
    caller: &dyn ConfigCaller,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value> {
    let (operation, node_id) = resolve(method, path)?;
    debug!(%method, %path, ?operation, "dispatch config route");

    let node_id = node_id.unwrap_or_default();
    let value = match operation {
        RouteOperation::GetClusterConf => serde_json::to_value(caller.get_cluster_conf()?)?,
        RouteOperation::GetNodeConf => serde_json::to_value(caller.get_node_conf(&node_id)?)?,
        RouteOperation::EnumerateNodeConf => serde_json::to_value(caller.enumerate_node_conf()?)?,
        RouteOperation::SetClusterConf => {
            let conf: ClusterConfig = decode_body(body)?;
            caller.set_cluster_conf(Some(&conf))?;
            Value::Null
        }
        RouteOperation::SetNodeConf => {
            let conf: NodeConfig = decode_body(body)?;
            caller.set_node_conf(&conf)?;
            Value::Null
        }
        RouteOperation::UpdateClusterConf => {
            serde_json::to_value(caller.update_cluster_conf(require_body(body)?)?)?
        }
        RouteOperation::UpdateNodeConf => serde_json::to_value(caller.update_node_conf(require_body(body)?)?)?,
        RouteOperation::DeleteNodeConf => {
            caller.delete_node_conf(&node_id)?;
            Value::Null
        }
    };
    Ok(value)
}

fn require_body(body: Option<Value>) -> Result<Value> {
    match body {
        Some(Value::Null) | None => Err(InputError::MissingDocument.into()),
        Some(body) => Ok(body),
    }
}

fn decode_body<T: DeserializeOwned>(body: Option<Value>) -> Result<T> {
    serde_json::from_value(require_body(body)?)
        .map_err(|e| InputError::MalformedDocument(e.to_string()).into())
}
