use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cluster resolved to the endpoints the gateways talk to.
///
/// For bootstrap access `endpoints` are `host:port` pairs. For the Kubernetes
/// variant they are broker pod names and `role` carries the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTarget {
    pub name: String,
    pub endpoints: Vec<String>,
    pub role: Option<String>,
}

impl ClusterTarget {
    pub fn new(name: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            name: name.into(),
            endpoints,
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Comma-joined endpoints, as passed to `--bootstrap-server`
    pub fn bootstrap(&self) -> String {
        self.endpoints.join(",")
    }
}

/// One topic of a `kafka-topics.sh --describe` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub name: String,
    pub partition_count: u32,
    pub replication_factor: u32,
    pub config: String,
    /// Per-partition leader/replicas/ISR lines, kept as printed
    pub partitions: Vec<String>,
}

impl TopicRecord {
    pub fn replica_count(&self) -> u64 {
        u64::from(self.partition_count) * u64::from(self.replication_factor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    /// Raw state row (GROUP COORDINATOR (ID) ASSIGNMENT-STRATEGY STATE #MEMBERS)
    pub state: String,
    pub members: Vec<String>,
    pub describe: Vec<String>,
}

impl GroupRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Columns of a consumer group state row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub group: String,
    pub coordinator: String,
    pub coordinator_id: String,
    pub assignment_strategy: String,
    pub state: String,
    pub members: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub principal: String,
    pub host: String,
    pub read: bool,
    pub write: bool,
    pub describe: bool,
    pub permission_type: String,
}

impl PermissionEntry {
    /// Set the flag matching `operation`; other operations leave the flags untouched
    pub fn grant(&mut self, operation: &str) {
        match operation {
            "READ" => self.read = true,
            "WRITE" => self.write = true,
            "DESCRIBE" => self.describe = true,
            _ => {}
        }
    }

    /// Fixed-width R/W/D flags, blanks where not granted
    pub fn flags(&self) -> String {
        let flag = |set: bool, c: &str| if set { c.to_string() } else { " ".to_string() };
        format!("{} {} {}", flag(self.read, "R"), flag(self.write, "W"), flag(self.describe, "D"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRecord {
    pub resource_type: String,
    pub name: String,
    pub pattern_type: String,
    pub permissions: Vec<PermissionEntry>,
}

impl AclRecord {
    pub fn new(resource_type: &str, name: &str, pattern_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            pattern_type: pattern_type.to_string(),
            permissions: Vec::new(),
        }
    }

    /// Fold a permission line into the record: at most one entry per (principal, host)
    pub fn fold_permission(&mut self, principal: &str, host: &str, operation: &str, permission_type: &str) {
        if let Some(entry) = self
            .permissions
            .iter_mut()
            .find(|p| p.principal == principal && p.host == host)
        {
            entry.grant(operation);
            return;
        }

        let mut entry = PermissionEntry {
            principal: principal.to_string(),
            host: host.to_string(),
            read: false,
            write: false,
            describe: false,
            permission_type: permission_type.to_string(),
        };
        entry.grant(operation);
        self.permissions.push(entry);
    }
}

/// Marker value printed by kafka-configs.sh for unset keys
pub const NULL_CONFIG_VALUE: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub sensitive: bool,
    pub synonyms: String,
}

impl ConfigEntry {
    pub fn is_displayed(&self, show_null: bool) -> bool {
        self.value != NULL_CONFIG_VALUE || show_null
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSize {
    /// `<topic>-<index>` label
    pub partition: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDirRecord {
    pub broker: i32,
    pub log_dirs: Vec<String>,
    pub partitions: Vec<PartitionSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub help: Option<String>,
    pub value: String,
    pub line: String,
}

/// Partition health options of `kafka-topics.sh --describe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthCheck {
    UnderReplicated,
    UnderMinIsr,
    AtMinIsr,
    Unavailable,
}

impl HealthCheck {
    pub const ALL: [HealthCheck; 4] = [
        HealthCheck::UnderReplicated,
        HealthCheck::UnderMinIsr,
        HealthCheck::AtMinIsr,
        HealthCheck::Unavailable,
    ];

    pub fn flag(&self) -> &'static str {
        match self {
            HealthCheck::UnderReplicated => "--under-replicated-partitions",
            HealthCheck::UnderMinIsr => "--under-min-isr-partitions",
            HealthCheck::AtMinIsr => "--at-min-isr-partitions",
            HealthCheck::Unavailable => "--unavailable-partitions",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthCheck::UnderReplicated => "URP",
            HealthCheck::UnderMinIsr => "UMISR",
            HealthCheck::AtMinIsr => "AMISR",
            HealthCheck::Unavailable => "UNAV",
        }
    }
}

/// Records gathered for one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCluster<T> {
    pub cluster: String,
    pub records: T,
}

impl<T> PerCluster<T> {
    pub fn new(cluster: impl Into<String>, records: T) -> Self {
        Self {
            cluster: cluster.into(),
            records,
        }
    }
}

/// Output lines of each health check run against a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub cluster: String,
    pub checks: BTreeMap<HealthCheck, Vec<String>>,
}

/// Exporter metrics of one broker host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMetrics {
    pub endpoint: String,
    /// Node exporter samples
    pub node: BTreeMap<String, MetricSample>,
    /// Kafka JMX exporter samples
    pub kafka: BTreeMap<String, MetricSample>,
}

impl BrokerMetrics {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.node
            .get(name)
            .or_else(|| self.kafka.get(name))
            .map(|m| m.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Everything the `info` command collects for a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDiagnostics {
    pub cluster: String,
    pub topics: Vec<String>,
    pub log_dirs: Vec<LogDirRecord>,
    pub brokers: Vec<BrokerMetrics>,
}
