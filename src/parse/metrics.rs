use regex::Regex;
use std::collections::BTreeMap;

use crate::scan::types::MetricSample;

pub const NODE_FS_AVAIL: &str = "node_filesystem_avail_bytes";
pub const NODE_FS_FREE: &str = "node_filesystem_free_bytes";
pub const NODE_FS_SIZE: &str = "node_filesystem_size_bytes";
/// Carries the broker version as a label
pub const KAFKA_APP_INFO: &str = "kafka_app_info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// `name{labels} value`
    Generic,
    /// `name{version="x.y.z",...} 1.0`, the version is the value
    VersionLabel,
}

/// A metric to pick out of an exposition page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub name: String,
    /// Only value lines containing this text are considered (e.g. a mountpoint)
    pub label_filter: Option<String>,
    pub kind: MetricKind,
}

impl MetricQuery {
    pub fn generic(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label_filter: None,
            kind: MetricKind::Generic,
        }
    }

    pub fn with_label_filter(mut self, filter: &str) -> Self {
        self.label_filter = Some(filter.to_string());
        self
    }

    pub fn version_label(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label_filter: None,
            kind: MetricKind::VersionLabel,
        }
    }
}

/// Node exporter filesystem metrics of the Kafka data mount
pub fn node_metric_queries(data_mount: &str) -> Vec<MetricQuery> {
    [NODE_FS_AVAIL, NODE_FS_FREE, NODE_FS_SIZE]
        .iter()
        .map(|name| MetricQuery::generic(name).with_label_filter(data_mount))
        .collect()
}

pub fn kafka_metric_queries() -> Vec<MetricQuery> {
    vec![MetricQuery::version_label(KAFKA_APP_INFO)]
}

struct CompiledQuery<'a> {
    query: &'a MetricQuery,
    help: Regex,
    value: Regex,
}

impl<'a> CompiledQuery<'a> {
    fn new(query: &'a MetricQuery) -> Option<Self> {
        let name = regex::escape(&query.name);
        let help = Regex::new(&format!(r"^#\s*HELP\s+{name}(?:\s+(.*))?$")).ok()?;
        let value = match query.kind {
            MetricKind::Generic => Regex::new(&format!(r"^{name}(\{{.*\}})?\s+(\S+)")),
            MetricKind::VersionLabel => Regex::new(&format!(r#"^{name}\{{.*?version="([^"]*)".*\}}"#)),
        }
        .ok()?;
        Some(Self { query, help, value })
    }

    fn extract_value(&self, line: &str) -> Option<String> {
        let caps = self.value.captures(line)?;
        let value = match self.query.kind {
            MetricKind::Generic => caps.get(2),
            MetricKind::VersionLabel => caps.get(1),
        }?;
        Some(value.as_str().to_string())
    }
}

/// Extract the requested metrics from a Prometheus exposition page.
///
/// Only lines containing a metric's name are looked at. When several value lines
/// match, the last one wins.
pub fn parse_metrics(raw: &str, queries: &[MetricQuery]) -> BTreeMap<String, MetricSample> {
    let mut samples = BTreeMap::new();

    for compiled in queries.iter().filter_map(CompiledQuery::new) {
        let name = &compiled.query.name;
        for line in raw.lines().filter(|l| l.contains(name.as_str())) {
            if let Some(caps) = compiled.help.captures(line) {
                let sample = samples.entry(name.clone()).or_insert_with(|| MetricSample {
                    name: name.clone(),
                    ..Default::default()
                });
                sample.help = Some(caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default());
                continue;
            }

            if let Some(filter) = &compiled.query.label_filter {
                if !line.contains(filter.as_str()) {
                    continue;
                }
            }

            if let Some(value) = compiled.extract_value(line) {
                let sample = samples.entry(name.clone()).or_insert_with(|| MetricSample {
                    name: name.clone(),
                    ..Default::default()
                });
                sample.value = value;
                sample.line = line.to_string();
            }
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_PAGE: &str = r#"# HELP node_filesystem_avail_bytes Filesystem space available to non-root users in bytes.
# TYPE node_filesystem_avail_bytes gauge
node_filesystem_avail_bytes{device="/dev/sda1",fstype="xfs",mountpoint="/"} 5.0e+09
node_filesystem_avail_bytes{device="/dev/sdb",fstype="xfs",mountpoint="/opt/kafkadata"} 2.5e+10
# HELP node_filesystem_size_bytes Filesystem size in bytes.
node_filesystem_size_bytes{device="/dev/sdb",fstype="xfs",mountpoint="/opt/kafkadata"} 1.0e+11
node_filesystem_size_bytes_total 42
"#;

    #[test]
    fn test_node_metrics_filtered_by_mount() {
        let samples = parse_metrics(NODE_PAGE, &node_metric_queries("/opt/kafkadata"));

        let avail = &samples[NODE_FS_AVAIL];
        assert_eq!(avail.value, "2.5e+10");
        assert_eq!(
            avail.help.as_deref(),
            Some("Filesystem space available to non-root users in bytes.")
        );
        assert!(avail.line.contains("mountpoint=\"/opt/kafkadata\""));

        assert_eq!(samples[NODE_FS_SIZE].value, "1.0e+11");
        // not exposed at all
        assert!(!samples.contains_key(NODE_FS_FREE));
    }

    #[test]
    fn test_app_info_version() {
        let page = "# HELP kafka_app_info Kafka version\nkafka_app_info{version=\"2.8.1\",} 1.0\n";
        let samples = parse_metrics(page, &kafka_metric_queries());
        assert_eq!(samples[KAFKA_APP_INFO].value, "2.8.1");
        assert_eq!(samples[KAFKA_APP_INFO].help.as_deref(), Some("Kafka version"));
    }

    #[test]
    fn test_generic_without_labels() {
        let page = "process_open_fds 123\nprocess_open_fds_max 4096\n";
        let samples = parse_metrics(page, &[MetricQuery::generic("process_open_fds")]);
        assert_eq!(samples["process_open_fds"].value, "123");
        assert_eq!(samples["process_open_fds"].help, None);
    }

    #[test]
    fn test_unmatched_page_is_empty() {
        let samples = parse_metrics("garbage\n", &kafka_metric_queries());
        assert!(samples.is_empty());
    }
}
