pub mod json;
pub mod terminal;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::{ClusterInfo, InfoTotals, TopicSummary};
use crate::collectors::kube::MirrorMaker2;
use crate::dispatch::EntityError;
use crate::scan::types::{
    AclRecord, ClusterDiagnostics, ClusterHealth, ConfigEntry, GroupRecord, LogDirRecord, PerCluster, TopicRecord,
};

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur during report generation
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Trait for report generators
pub trait ReportGenerator {
    /// Render a report, with the per-entity failures met while gathering it
    fn render(&self, report: &Report, errors: &[EntityError]) -> ReportResult<String>;

    /// Get generator name
    fn name(&self) -> &'static str;
}

/// Topics of one Kafka cluster running in Kubernetes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KubeTopics {
    pub namespace: String,
    pub cluster: String,
    /// Counts over every topic of the cluster, before any display filter
    pub summary: TopicSummary,
    pub topics: Vec<TopicRecord>,
}

/// Pods of a namespace grouped by component, ordinals as printed by kubectl
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespacePods {
    pub namespace: String,
    pub components: BTreeMap<String, Vec<String>>,
}

/// Everything one command gathered, ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "data", rename_all = "snake_case")]
pub enum Report {
    TopicNames(Vec<PerCluster<Vec<String>>>),
    Topics(Vec<PerCluster<Vec<TopicRecord>>>),
    Health(Vec<ClusterHealth>),
    Groups {
        clusters: Vec<PerCluster<Vec<GroupRecord>>>,
        /// Members and per-partition lines were requested
        detailed: bool,
    },
    Acls(Vec<PerCluster<Vec<AclRecord>>>),
    Configs {
        broker: i32,
        clusters: Vec<PerCluster<Vec<ConfigEntry>>>,
    },
    LogDirs(Vec<PerCluster<Vec<LogDirRecord>>>),
    Info {
        summaries: Vec<ClusterInfo>,
        totals: InfoTotals,
        diagnostics: Vec<ClusterDiagnostics>,
        /// Metric names of the per-broker table, node exporter first
        metrics: Vec<String>,
    },
    KubeTopics(Vec<KubeTopics>),
    Namespaces(Vec<NamespacePods>),
    MirrorMakers(Vec<PerCluster<Vec<MirrorMaker2>>>),
}

impl Report {
    pub fn info(diagnostics: Vec<ClusterDiagnostics>, metrics: Vec<String>) -> Self {
        let summaries: Vec<ClusterInfo> = diagnostics.iter().map(ClusterInfo::from_diagnostics).collect();
        Report::Info {
            totals: InfoTotals::from_infos(&summaries),
            summaries,
            diagnostics,
            metrics,
        }
    }

    /// Command name used in JSON output
    pub fn command(&self) -> &'static str {
        match self {
            Report::TopicNames(_) | Report::Topics(_) => "topic",
            Report::Health(_) => "health",
            Report::Groups { .. } => "group",
            Report::Acls(_) => "acl",
            Report::Configs { .. } => "config",
            Report::LogDirs(_) => "partitions",
            Report::Info { .. } => "info",
            Report::KubeTopics(_) => "ktopic",
            Report::Namespaces(_) => "namespace",
            Report::MirrorMakers(_) => "kmm2",
        }
    }
}
