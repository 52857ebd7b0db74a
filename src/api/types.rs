//! Request and response messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::Status;
use crate::domain::ClusterSnapshot;
use crate::error::{Error, Result};
use crate::port::inbound::control::StartParams;

/// A control-plane call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Start(StartRequest),
    Health,
    Uris,
    Status,
    StreamStatus(StreamStatusRequest),
    RemoveNode(RemoveNodeRequest),
    RestartNode(RestartNodeRequest),
    Stop,
}

impl Request {
    /// Method name used in logs and HTTP routes.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Start(_) => "start",
            Self::Health => "health",
            Self::Uris => "uris",
            Self::Status => "status",
            Self::StreamStatus(_) => "stream_status",
            Self::RemoveNode(_) => "remove_node",
            Self::RestartNode(_) => "restart_node",
            Self::Stop => "stop",
        }
    }
}

/// Parameters for starting a cluster or restarting a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub exec_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelisted_subnets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl From<StartRequest> for StartParams {
    fn from(request: StartRequest) -> Self {
        Self {
            exec_path: request.exec_path.into(),
            whitelisted_subnets: request.whitelisted_subnets.unwrap_or_default(),
            log_level: request.log_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatusRequest {
    /// Maximum gap between two pushed snapshots, in milliseconds.
    pub push_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNodeRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartNodeRequest {
    pub name: String,
    pub start: StartRequest,
}

/// A control-plane answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ping { pid: u32 },
    Cluster { cluster_info: ClusterInfo },
    Uris { uris: Vec<String> },
    Error(Status),
}

impl Response {
    /// Unwrap a cluster payload, turning an error frame into [`Error::Remote`].
    pub fn into_cluster(self) -> Result<ClusterInfo> {
        match self {
            Self::Cluster { cluster_info } => Ok(cluster_info),
            Self::Error(status) => Err(Error::Remote(status)),
            other => Err(unexpected("cluster", &other)),
        }
    }

    pub fn into_uris(self) -> Result<Vec<String>> {
        match self {
            Self::Uris { uris } => Ok(uris),
            Self::Error(status) => Err(Error::Remote(status)),
            other => Err(unexpected("uris", &other)),
        }
    }

    pub fn into_pid(self) -> Result<u32> {
        match self {
            Self::Ping { pid } => Ok(pid),
            Self::Error(status) => Err(Error::Remote(status)),
            other => Err(unexpected("ping", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Response) -> Error {
    Error::Internal(format!("expected {expected} response, got {got:?}"))
}

/// Wire form of a [`ClusterSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub node_names: Vec<String>,
    pub node_infos: BTreeMap<String, NodeInfo>,
    pub pid: u32,
    pub root_data_dir: String,
    pub healthy: bool,
}

/// Wire form of one node's config and registry record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub exec_path: String,
    pub uri: String,
    pub id: String,
    pub log_dir: String,
    pub db_dir: String,
    pub whitelisted_subnets: String,
    pub config: Vec<u8>,
}

impl From<&ClusterSnapshot> for ClusterInfo {
    fn from(snapshot: &ClusterSnapshot) -> Self {
        let node_infos = snapshot
            .node_names
            .iter()
            .filter_map(|name| {
                let config = snapshot.config(name)?;
                let record = snapshot.record(name)?;
                Some((
                    name.clone(),
                    NodeInfo {
                        name: name.clone(),
                        exec_path: config.exec_path.to_string_lossy().into_owned(),
                        uri: record.uri().to_string(),
                        id: record.id().to_string(),
                        log_dir: config.log_dir.to_string_lossy().into_owned(),
                        db_dir: config.db_dir.to_string_lossy().into_owned(),
                        whitelisted_subnets: config.whitelisted_subnets.clone(),
                        config: config.payload.clone(),
                    },
                ))
            })
            .collect();

        Self {
            node_names: snapshot.node_names.clone(),
            node_infos,
            pid: snapshot.pid,
            root_data_dir: snapshot.root_data_dir.to_string_lossy().into_owned(),
            healthy: snapshot.healthy,
        }
    }
}

impl From<ClusterSnapshot> for ClusterInfo {
    fn from(snapshot: ClusterSnapshot) -> Self {
        Self::from(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Code;

    #[test]
    fn unit_request_has_no_params() {
        let json = serde_json::to_string(&Request::Ping).unwrap();
        assert_eq!(json, r#"{"method":"ping"}"#);
        let parsed: Request = serde_json::from_str(r#"{"method":"stop"}"#).unwrap();
        assert_eq!(parsed, Request::Stop);
    }

    #[test]
    fn start_request_optional_fields_default() {
        let parsed: Request =
            serde_json::from_str(r#"{"method":"start","params":{"exec_path":"/bin/node"}}"#)
                .unwrap();
        let Request::Start(start) = parsed else {
            panic!("expected start request");
        };
        assert_eq!(start.exec_path, "/bin/node");
        assert!(start.whitelisted_subnets.is_none());
        assert!(start.log_level.is_none());
    }

    #[test]
    fn error_frame_becomes_remote_error() {
        let response = Response::Error(Status::new(Code::NotFound, "node9"));
        let err = response.into_cluster().unwrap_err();
        assert!(matches!(err, Error::Remote(ref s) if s.code == Code::NotFound));
    }

    #[test]
    fn wrong_payload_is_internal_error() {
        let err = Response::Ping { pid: 1 }.into_uris().unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
