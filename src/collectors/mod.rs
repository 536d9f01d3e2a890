pub mod admin;
pub mod kube;
pub mod metrics;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::scan::probe::ProbeError;
use crate::scan::types::{ClusterTarget, HealthCheck};

pub use admin::ShellGateway;
pub use kube::KubeGateway;

/// Result type for gateway operations
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors raised at the external query boundary
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] ProbeError),

    #[error("Command timeout after {timeout_ms} ms")]
    Timeout { timeout_ms: u128 },

    #[error("Command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Command `{command}` wrote to stderr: {stderr}")]
    Stderr { command: String, stderr: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("{0} is not supported by this gateway")]
    Unsupported(&'static str),
}

/// The external collaborator every diagnostic goes through.
///
/// Implementations only run read-only commands. `target` carries the endpoints
/// (or pods) the command is pointed at.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Checks that the cluster can be queried at all
    async fn preflight(&self, target: &ClusterTarget) -> CollectorResult<()>;

    /// Runs one admin script and returns its stdout
    async fn run_admin_query(&self, target: &ClusterTarget, query: &AdminQuery) -> CollectorResult<String>;

    /// `GET http://host:port/metrics`
    async fn fetch_metrics(&self, host: &str, port: u16, timeout: Duration) -> CollectorResult<String>;

    fn name(&self) -> &'static str;
}

/// Which part of a consumer group to describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupDetail {
    /// Per-partition offsets and lag
    Offsets,
    State,
    Members,
}

impl GroupDetail {
    pub const ALL: [GroupDetail; 3] = [GroupDetail::State, GroupDetail::Members, GroupDetail::Offsets];
}

/// Read-only admin operations, rendered to a Kafka script invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminQuery {
    TopicList,
    TopicDescribe { topic: Option<String> },
    TopicHealth(HealthCheck),
    GroupList,
    GroupDescribe { group: String, detail: GroupDetail },
    GroupStateAll,
    AclList { topic: Option<String> },
    BrokerConfig { broker: i32 },
    LogDirs { brokers: Option<Vec<i32>> },
}

impl AdminQuery {
    pub fn script(&self) -> &'static str {
        match self {
            AdminQuery::TopicList | AdminQuery::TopicDescribe { .. } | AdminQuery::TopicHealth(_) => {
                "kafka-topics.sh"
            }
            AdminQuery::GroupList | AdminQuery::GroupDescribe { .. } | AdminQuery::GroupStateAll => {
                "kafka-consumer-groups.sh"
            }
            AdminQuery::AclList { .. } => "kafka-acls.sh",
            AdminQuery::BrokerConfig { .. } => "kafka-configs.sh",
            AdminQuery::LogDirs { .. } => "kafka-log-dirs.sh",
        }
    }

    /// Script path, under `bin_dir` when one is configured
    pub fn program(&self, bin_dir: Option<&Path>) -> String {
        match bin_dir {
            Some(dir) => dir.join(self.script()).to_string_lossy().into_owned(),
            None => self.script().to_string(),
        }
    }

    pub fn args(&self, bootstrap: &str) -> Vec<String> {
        let mut args = vec!["--bootstrap-server".to_string(), bootstrap.to_string()];
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

        match self {
            AdminQuery::TopicList | AdminQuery::GroupList => push(&["--list"]),
            AdminQuery::TopicDescribe { topic } => {
                push(&["--describe"]);
                if let Some(topic) = topic {
                    push(&["--topic", topic]);
                }
            }
            AdminQuery::TopicHealth(check) => push(&["--describe", check.flag()]),
            AdminQuery::GroupDescribe { group, detail } => {
                push(&["--describe", "--group", group, "--verbose"]);
                match detail {
                    GroupDetail::State => push(&["--state"]),
                    GroupDetail::Members => push(&["--members"]),
                    GroupDetail::Offsets => {}
                }
            }
            AdminQuery::GroupStateAll => push(&["--describe", "--all-groups", "--verbose", "--state"]),
            AdminQuery::AclList { topic } => {
                push(&["--list"]);
                if let Some(topic) = topic {
                    push(&["--topic", topic]);
                }
            }
            AdminQuery::BrokerConfig { broker } => {
                push(&["--describe", "--broker", &broker.to_string(), "--all"]);
            }
            AdminQuery::LogDirs { brokers } => {
                push(&["--describe"]);
                if let Some(brokers) = brokers {
                    let list = brokers.iter().map(i32::to_string).collect::<Vec<_>>().join(",");
                    push(&["--broker-list", &list]);
                }
            }
        }

        args
    }
}

/// Renders a command line for logs and error messages
pub(crate) fn describe_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawn `command` and wait for it, optionally bounded by `timeout`
pub(crate) async fn execute(mut command: Command, timeout: Option<Duration>) -> CollectorResult<Output> {
    command.kill_on_drop(true);
    debug!("Executing {:?}", command.as_std());

    match timeout {
        Some(limit) => tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| CollectorError::Timeout {
                timeout_ms: limit.as_millis(),
            })?
            .map_err(CollectorError::from),
        None => command.output().await.map_err(CollectorError::from),
    }
}
