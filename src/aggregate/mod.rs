//! Canonical ordering and summary reductions over gathered records.
//!
//! Sorting uses a total order on every record field after the documented keys, so
//! merged output does not depend on the order results arrived in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::parse::metrics::{KAFKA_APP_INFO, NODE_FS_AVAIL, NODE_FS_SIZE};
use crate::scan::types::{
    AclRecord, BrokerMetrics, ClusterDiagnostics, ClusterHealth, ConfigEntry, GroupRecord, HealthCheck,
    LogDirRecord, PerCluster, TopicRecord,
};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// By name, then partition count
pub fn sort_topics(topics: &mut [TopicRecord]) {
    topics.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.partition_count.cmp(&b.partition_count))
            .then(a.replication_factor.cmp(&b.replication_factor))
            .then_with(|| a.config.cmp(&b.config))
            .then_with(|| a.partitions.cmp(&b.partitions))
    });
}

/// By name, then state row
pub fn sort_groups(groups: &mut [GroupRecord]) {
    groups.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.state.cmp(&b.state))
            .then_with(|| a.members.cmp(&b.members))
            .then_with(|| a.describe.cmp(&b.describe))
    });
}

/// By resource type, then resource name
pub fn sort_acls(acls: &mut [AclRecord]) {
    acls.sort_by(|a, b| {
        a.resource_type
            .cmp(&b.resource_type)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.pattern_type.cmp(&b.pattern_type))
    });
}

/// By key, sensitive entries first
pub fn sort_configs(configs: &mut [ConfigEntry]) {
    configs.sort_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then(b.sensitive.cmp(&a.sensitive))
            .then_with(|| a.value.cmp(&b.value))
    });
}

/// Concatenate per-cluster topic results: clusters by name, each sorted
pub fn merge_topic_rounds(
    rounds: impl IntoIterator<Item = PerCluster<Vec<TopicRecord>>>,
) -> Vec<PerCluster<Vec<TopicRecord>>> {
    merge_rounds(rounds, sort_topics)
}

pub fn merge_group_rounds(
    rounds: impl IntoIterator<Item = PerCluster<Vec<GroupRecord>>>,
) -> Vec<PerCluster<Vec<GroupRecord>>> {
    merge_rounds(rounds, sort_groups)
}

fn merge_rounds<T>(
    rounds: impl IntoIterator<Item = PerCluster<Vec<T>>>,
    sort: fn(&mut [T]),
) -> Vec<PerCluster<Vec<T>>> {
    let mut merged: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for round in rounds {
        merged.entry(round.cluster).or_default().extend(round.records);
    }
    merged
        .into_iter()
        .map(|(cluster, mut records)| {
            sort(&mut records);
            PerCluster::new(cluster, records)
        })
        .collect()
}

/// Size of one partition replica hosted by a broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionUsage {
    pub index: u32,
    pub size: u64,
}

/// Partitions of a broker grouped by topic, each list ordered by index then size.
///
/// The label is split at its last `-`; a non-numeric index is skipped.
pub fn group_partitions(record: &LogDirRecord) -> BTreeMap<String, Vec<PartitionUsage>> {
    let mut topics: BTreeMap<String, Vec<PartitionUsage>> = BTreeMap::new();
    for partition in &record.partitions {
        let Some((topic, index)) = partition.partition.rsplit_once('-') else {
            warn!("Partition label without index: {}", partition.partition);
            continue;
        };
        match index.parse::<u32>() {
            Ok(index) => topics.entry(topic.to_string()).or_default().push(PartitionUsage {
                index,
                size: partition.size,
            }),
            Err(_) => warn!("Bad partition index in {}", partition.partition),
        }
    }

    for usages in topics.values_mut() {
        usages.sort_by(|a, b| a.index.cmp(&b.index).then(a.size.cmp(&b.size)));
    }
    topics
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topics: usize,
    pub partitions: u64,
    /// Partitions times replication factor, summed
    pub replicas: u64,
}

impl TopicSummary {
    pub fn from_records(topics: &[TopicRecord]) -> Self {
        Self {
            topics: topics.len(),
            partitions: topics.iter().map(|t| u64::from(t.partition_count)).sum(),
            replicas: topics.iter().map(TopicRecord::replica_count).sum(),
        }
    }
}

/// Number of affected partitions per health check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCounts {
    pub cluster: String,
    pub counts: BTreeMap<HealthCheck, usize>,
}

impl HealthCounts {
    pub fn from_health(health: &ClusterHealth) -> Self {
        Self {
            cluster: health.cluster.clone(),
            counts: health
                .checks
                .iter()
                .map(|(check, lines)| (*check, lines.len()))
                .collect(),
        }
    }

    pub fn get(&self, check: HealthCheck) -> usize {
        self.counts.get(&check).copied().unwrap_or(0)
    }
}

fn parse_float(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    match value.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Not a number: {}", value);
            None
        }
    }
}

/// Used share of the Kafka data mount, `100 - avail/size*100`
pub fn kafkadata_usage_percent(metrics: &BrokerMetrics) -> Option<f64> {
    let avail = parse_float(metrics.value(NODE_FS_AVAIL))?;
    let size = parse_float(metrics.value(NODE_FS_SIZE))?;
    if size == 0.0 {
        return None;
    }
    Some(100.0 - avail / size * 100.0)
}

pub fn to_gib(bytes: Option<&str>) -> Option<f64> {
    parse_float(bytes).map(|b| b / GIB)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerUsage {
    pub endpoint: String,
    pub usage_percent: Option<f64>,
    pub disk_gib: Option<f64>,
    pub version: Option<String>,
}

impl BrokerUsage {
    pub fn from_metrics(metrics: &BrokerMetrics) -> Self {
        Self {
            endpoint: metrics.endpoint.clone(),
            usage_percent: kafkadata_usage_percent(metrics),
            disk_gib: to_gib(metrics.value(NODE_FS_SIZE)),
            version: metrics.value(KAFKA_APP_INFO).map(str::to_string),
        }
    }
}

/// Summary line of the `info` command for one cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster: String,
    pub topic_count: usize,
    /// Partition replicas hosted by each broker, by broker id
    pub partitions_per_broker: Vec<usize>,
    pub partition_total: usize,
    pub brokers: Vec<BrokerUsage>,
}

impl ClusterInfo {
    pub fn from_diagnostics(diagnostics: &ClusterDiagnostics) -> Self {
        let mut log_dirs: Vec<&LogDirRecord> = diagnostics.log_dirs.iter().collect();
        log_dirs.sort_by_key(|r| r.broker);
        let partitions_per_broker: Vec<usize> = log_dirs.iter().map(|r| r.partitions.len()).collect();

        Self {
            cluster: diagnostics.cluster.clone(),
            topic_count: diagnostics.topics.len(),
            partition_total: partitions_per_broker.iter().sum(),
            partitions_per_broker,
            brokers: diagnostics.brokers.iter().map(BrokerUsage::from_metrics).collect(),
        }
    }

    pub fn disk_gib(&self) -> f64 {
        self.brokers.iter().filter_map(|b| b.disk_gib).sum()
    }
}

/// Totals across every cluster of an `info` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoTotals {
    pub clusters: usize,
    pub topics: usize,
    pub partitions: usize,
    pub disk_gib: f64,
}

impl InfoTotals {
    pub fn from_infos(infos: &[ClusterInfo]) -> Self {
        Self {
            clusters: infos.len(),
            topics: infos.iter().map(|i| i.topic_count).sum(),
            partitions: infos.iter().map(|i| i.partition_total).sum(),
            disk_gib: infos.iter().map(ClusterInfo::disk_gib).sum(),
        }
    }
}
