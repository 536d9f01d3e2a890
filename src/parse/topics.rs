use once_cell::sync::Lazy;
use regex::Regex;

use super::is_tool_noise;
use crate::scan::types::TopicRecord;

static TOPIC_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^Topic:\s*(\S+)\s+(?:TopicId:\s*\S+\s+)?PartitionCount:\s*(\d+)\s+ReplicationFactor:\s*(\d+)\s+Configs:\s*(.*)$",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// Parse a `kafka-topics.sh --describe` response.
///
/// A header line announces `n` partitions; the `n` lines that follow it are taken as
/// that topic's partition descriptors, whatever they contain.
pub fn parse_topic_descriptions(raw: &str) -> Vec<TopicRecord> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut records = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = TOPIC_HEADER_REGEX.captures(lines[i].trim()) else {
            i += 1;
            continue;
        };

        let (Ok(partition_count), Ok(replication_factor)) =
            (caps[2].parse::<u32>(), caps[3].parse::<u32>())
        else {
            i += 1;
            continue;
        };

        let start = i + 1;
        let end = (start + partition_count as usize).min(lines.len());
        let partitions = lines[start..end]
            .iter()
            .map(|l| l.trim().to_string())
            .collect();

        records.push(TopicRecord {
            name: caps[1].to_string(),
            partition_count,
            replication_factor,
            config: caps[4].trim().to_string(),
            partitions,
        });
        i = end;
    }

    records
}

/// Parse `--list` output (topics or groups): one name per line
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_tool_noise(l))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_topic_with_partitions() {
        let raw = "Topic: t1\tPartitionCount: 2\tReplicationFactor: 3\tConfigs: x=y\n\tp0\n\tp1\n";
        let records = parse_topic_descriptions(raw);

        assert_eq!(records.len(), 1);
        let t1 = &records[0];
        assert_eq!(t1.name, "t1");
        assert_eq!(t1.partition_count, 2);
        assert_eq!(t1.replication_factor, 3);
        assert_eq!(t1.config, "x=y");
        assert_eq!(t1.partitions, vec!["p0", "p1"]);
    }

    #[test]
    fn test_partition_lines_are_consumed_before_next_header() {
        let raw = "\
Topic: orders\tTopicId: abc\tPartitionCount: 1\tReplicationFactor: 1\tConfigs:
Topic: orders\tPartition: 0\tLeader: 1\tReplicas: 1\tIsr: 1
some trailing noise
Topic: payments\tPartitionCount: 3\tReplicationFactor: 2\tConfigs: min.insync.replicas=2
\tTopic: payments\tPartition: 0\tLeader: 1\tReplicas: 1,2\tIsr: 1,2
\tTopic: payments\tPartition: 1\tLeader: 2\tReplicas: 2,3\tIsr: 2,3
\tTopic: payments\tPartition: 2\tLeader: 3\tReplicas: 3,1\tIsr: 3
";
        let records = parse_topic_descriptions(raw);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "orders");
        assert_eq!(records[0].config, "");
        assert_eq!(records[0].partitions.len(), 1);
        assert_eq!(records[1].name, "payments");
        assert_eq!(records[1].partitions.len(), 3);
        assert!(records[1].partitions[2].ends_with("Isr: 3"));
    }

    #[test]
    fn test_exactly_n_lines_regardless_of_noise() {
        let raw = "\
Topic: a PartitionCount: 2 ReplicationFactor: 1 Configs:
  line-a0
  noise that is still a descriptor
junk between headers
Topic: b PartitionCount: 1 ReplicationFactor: 2 Configs: cleanup.policy=compact
  line-b0
";
        let records = parse_topic_descriptions(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].partitions.len(), 2);
        assert_eq!(records[1].partitions, vec!["line-b0"]);
        assert_eq!(records[1].replica_count(), 2);
    }

    #[test]
    fn test_truncated_output_keeps_available_lines() {
        let raw = "Topic: t PartitionCount: 4 ReplicationFactor: 1 Configs: \n p0\n";
        let records = parse_topic_descriptions(raw);
        assert_eq!(records[0].partition_count, 4);
        assert_eq!(records[0].partitions, vec!["p0"]);
    }

    #[test]
    fn test_parse_name_list() {
        let raw = "__consumer_offsets\n[2024-01-01 WARN something]\n\norders\n  payments  \n";
        assert_eq!(parse_name_list(raw), vec!["__consumer_offsets", "orders", "payments"]);
    }
}
