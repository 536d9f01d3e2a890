use super::{KubeTopics, NamespacePods, Report, ReportGenerator, ReportResult};
use crate::aggregate::{group_partitions, ClusterInfo, HealthCounts, InfoTotals};
use crate::collectors::kube::MirrorMaker2;
use crate::dispatch::EntityError;
use crate::scan::types::{
    AclRecord, ClusterDiagnostics, ClusterHealth, ConfigEntry, GroupRecord, GroupState, HealthCheck, LogDirRecord,
    PerCluster, TopicRecord,
};
use colored::{ColoredString, Colorize};

/// Width of the assignment strategy column of the group table
const STRATEGY_WIDTH: usize = 19;

/// Width of a metric value cell of the `info` table
const METRIC_CELL_WIDTH: usize = 20;

/// Plain-text rendering for the console
pub struct TerminalReporter {
    short: bool,
    show_null: bool,
    use_colors: bool,
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            short: false,
            show_null: false,
            use_colors: true,
        }
    }

    pub fn with_short(mut self, short: bool) -> Self {
        self.short = short;
        self
    }

    pub fn with_show_null(mut self, show_null: bool) -> Self {
        self.show_null = show_null;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn print(&self, report: &Report) {
        print!("{}", self.render_report(report));
    }

    pub fn render_report(&self, report: &Report) -> String {
        match report {
            Report::TopicNames(clusters) => self.topic_names(clusters),
            Report::Topics(clusters) => self.topics(clusters),
            Report::Health(clusters) => self.health(clusters),
            Report::Groups { clusters, detailed } => self.groups(clusters, *detailed),
            Report::Acls(clusters) => self.acls(clusters),
            Report::Configs { broker, clusters } => self.configs(*broker, clusters),
            Report::LogDirs(clusters) => self.log_dirs(clusters),
            Report::Info {
                summaries,
                totals,
                diagnostics,
                metrics,
            } => self.info(summaries, totals, diagnostics, metrics),
            Report::KubeTopics(clusters) => self.kube_topics(clusters),
            Report::Namespaces(namespaces) => self.namespaces(namespaces),
            Report::MirrorMakers(namespaces) => self.mirror_makers(namespaces),
        }
    }

    /// Styled text, or its plain input when colors are off
    fn paint(&self, text: ColoredString) -> String {
        if self.use_colors {
            text.to_string()
        } else {
            text.clear().to_string()
        }
    }

    fn topic_names(&self, clusters: &[PerCluster<Vec<String>>]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            for name in &cluster.records {
                out.push_str(name);
                out.push('\n');
            }
        }
        out
    }

    fn topics(&self, clusters: &[PerCluster<Vec<TopicRecord>>]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            out.push_str(&format!("{}\n", self.paint(cluster.cluster.bold())));
            out.push_str(&topic_lines(&cluster.records));
        }
        out
    }

    fn health(&self, clusters: &[ClusterHealth]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            let counts = HealthCounts::from_health(cluster);
            let count = |check: HealthCheck| {
                let n = counts.get(check);
                let cell = format!("{:3}", n);
                if n > 0 {
                    self.paint(cell.red())
                } else {
                    self.paint(cell.green())
                }
            };

            out.push_str(&format!(
                "{}: URP: {}, UMISR: {}, AMISR: {}, UNAV: {}\n",
                self.paint(cluster.cluster.bold()),
                count(HealthCheck::UnderReplicated),
                count(HealthCheck::UnderMinIsr),
                count(HealthCheck::AtMinIsr),
                count(HealthCheck::Unavailable)
            ));

            if !self.short {
                for (check, lines) in &cluster.checks {
                    out.push_str(&format!("\n {}:\n", check.label()));
                    for line in lines {
                        out.push_str(&format!(" {}\n", line));
                    }
                }
            }
        }
        out
    }

    fn groups(&self, clusters: &[PerCluster<Vec<GroupRecord>>], detailed: bool) -> String {
        let mut out = String::new();
        for cluster in clusters {
            out.push_str(&format!("{}\n", self.paint(cluster.cluster.bold())));
            if self.short {
                for group in &cluster.records {
                    out.push_str(&format!("{}\n", group.name));
                }
                continue;
            }

            out.push_str(&group_table(&cluster.records));
            if detailed {
                for group in &cluster.records {
                    for line in group.members.iter().chain(&group.describe) {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    fn acls(&self, clusters: &[PerCluster<Vec<AclRecord>>]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            out.push_str(&format!("Display acls of {}\n", self.paint(cluster.cluster.bold())));
            for acl in &cluster.records {
                out.push_str(&format!("{} {} ({})\n", acl.resource_type, acl.name, acl.pattern_type));
                for p in &acl.permissions {
                    out.push_str(&format!("\t{} {} {} {}\n", p.permission_type, p.flags(), p.host, p.principal));
                }
                out.push('\n');
            }
        }
        out
    }

    fn configs(&self, broker: i32, clusters: &[PerCluster<Vec<ConfigEntry>>]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            out.push_str(&format!("Config of {} (broker {})\n", self.paint(cluster.cluster.bold()), broker));
            for entry in cluster.records.iter().filter(|e| e.is_displayed(self.show_null)) {
                out.push_str(&format!("{} : {}\n", entry.key, entry.value));
                if !self.short {
                    out.push_str(&format!("synonym= {}\n", entry.synonyms));
                }
            }
        }
        out
    }

    fn log_dirs(&self, clusters: &[PerCluster<Vec<LogDirRecord>>]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            out.push_str(&format!("{}:\n", self.paint(cluster.cluster.bold())));
            let mut records: Vec<&LogDirRecord> = cluster.records.iter().collect();
            records.sort_by_key(|r| r.broker);

            for record in records {
                if self.short {
                    out.push_str(&format!("\tbroker: {}\n", record.broker));
                    for (topic, usages) in group_partitions(record) {
                        out.push_str(&format!("\t\t{}: ", topic));
                        for usage in usages {
                            out.push_str(&format!("[{} {}] ", usage.index, usage.size));
                        }
                        out.push('\n');
                    }
                } else {
                    out.push_str(&format!("\tbroker: {} {}\n", record.broker, record.log_dirs.join(",")));
                    for partition in &record.partitions {
                        out.push_str(&format!("\t\t{} {}\n", partition.partition, partition.size));
                    }
                }
            }
        }
        out
    }

    fn info(
        &self,
        summaries: &[ClusterInfo],
        totals: &InfoTotals,
        diagnostics: &[ClusterDiagnostics],
        metrics: &[String],
    ) -> String {
        let mut out = String::new();
        let width = metrics.iter().map(String::len).max().unwrap_or(0);

        for (summary, cluster) in summaries.iter().zip(diagnostics) {
            let per_broker = summary
                .partitions_per_broker
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let head = format!(
                "{} : {:3} {:4}[{:>16}]",
                self.paint(summary.cluster.bold()),
                summary.topic_count,
                summary.partition_total,
                per_broker
            );

            if self.short {
                out.push_str(&head);
                out.push_str("  ");
                for broker in &summary.brokers {
                    let usage = broker
                        .usage_percent
                        .map(|u| format!("{:5.2}%", u))
                        .unwrap_or_else(|| format!("{:>6}", "-"));
                    out.push_str(&format!(
                        "{}[{:4.0}G] {:>5}  ",
                        usage,
                        broker.disk_gib.unwrap_or(0.0),
                        broker.version.as_deref().unwrap_or("")
                    ));
                }
                out.push('\n');
            } else {
                out.push_str(&head);
                out.push('\n');
                for metric in metrics {
                    out.push_str(&format!("{:<width$} : ", metric, width = width));
                    for broker in &cluster.brokers {
                        out.push_str(&format!(
                            " {:<cell$} ",
                            broker.value(metric).unwrap_or(""),
                            cell = METRIC_CELL_WIDTH
                        ));
                    }
                    out.push_str(" \n");
                }
            }
        }

        if totals.clusters > 1 {
            out.push_str(&format!(
                "Nb servers : {}, Nb of topics : {} [{}], disk total : {:.0}G\n",
                totals.clusters, totals.topics, totals.partitions, totals.disk_gib
            ));
        }
        out
    }

    fn kube_topics(&self, clusters: &[KubeTopics]) -> String {
        let mut out = String::new();
        for cluster in clusters {
            out.push_str(&format!(
                "{} : {} [t={} p={} pr={}]\n",
                cluster.namespace,
                self.paint(cluster.cluster.bold()),
                cluster.summary.topics,
                cluster.summary.partitions,
                cluster.summary.replicas
            ));
            if self.short {
                for topic in &cluster.topics {
                    out.push_str(&format!("\t{}\n", topic.name));
                }
            } else {
                out.push_str(&topic_lines(&cluster.topics));
            }
        }
        out
    }

    fn namespaces(&self, namespaces: &[NamespacePods]) -> String {
        let mut out = String::new();
        for ns in namespaces {
            out.push_str(&format!("{}\n", self.paint(ns.namespace.bold())));
            if self.short {
                continue;
            }
            let width = ns.components.keys().map(String::len).max().unwrap_or(0);
            for (component, ordinals) in &ns.components {
                out.push_str(&format!("\t{:<width$}  {}\n", component, ordinals.join(" "), width = width));
            }
        }
        out
    }

    fn mirror_makers(&self, namespaces: &[PerCluster<Vec<MirrorMaker2>>]) -> String {
        let mut out = String::new();
        for ns in namespaces {
            out.push_str(&format!("{}:\n", self.paint(ns.cluster.bold())));
            for mm in &ns.records {
                out.push_str(&format!("  {} <- ", mm.connect_cluster));
                for mirror in &mm.mirrors {
                    out.push_str(&format!("{} [ {} ", mirror.source_cluster, mirror.topics_pattern));
                    if !mirror.topics_blacklist_pattern.is_empty() {
                        out.push_str(&format!("BLACKLIST={} ", mirror.topics_blacklist_pattern));
                    }
                    out.push_str("]    ");
                }
                out.push_str(" \n");
            }
        }
        out
    }
}

impl ReportGenerator for TerminalReporter {
    fn render(&self, report: &Report, _errors: &[EntityError]) -> ReportResult<String> {
        Ok(self.render_report(report))
    }

    fn name(&self) -> &'static str {
        "TerminalReporter"
    }
}

/// `name : p=<n>  r=<r>  c=<cfg>` lines, names padded to the longest one
fn topic_lines(topics: &[TopicRecord]) -> String {
    let width = topics.iter().map(|t| t.name.len()).max().unwrap_or(0);
    topics
        .iter()
        .map(|t| {
            format!(
                "{:<width$} : p={}  r={}  c={}\n",
                t.name,
                t.partition_count,
                t.replication_factor,
                t.config,
                width = width
            )
        })
        .collect()
}

/// Column-aligned group state table. Groups without a state row are left out.
fn group_table(groups: &[GroupRecord]) -> String {
    let rows: Vec<GroupState> = groups.iter().filter_map(GroupRecord::state_columns).collect();
    let group_width = rows.iter().map(|r| r.group.len()).max().unwrap_or(0);
    let coordinator_width = rows.iter().map(|r| r.coordinator.len()).max().unwrap_or(0);
    let state_width = rows.iter().map(|r| r.state.len()).max().unwrap_or(0);

    let mut out = format!(
        "{:<gw$}  {:<cw$}  {:<sw_strategy$}  {:<stw$}  {}\n",
        "GROUP",
        "COORDINATOR (ID)",
        "ASSIGNMENT-STRATEGY",
        "STATE",
        "#MEMBERS",
        gw = group_width,
        cw = coordinator_width + 5,
        sw_strategy = STRATEGY_WIDTH,
        stw = state_width
    );
    for row in rows {
        out.push_str(&format!(
            "{:<gw$}  {:<cw$} ({:>2})  {:<sw_strategy$}  {:<stw$}  {}\n",
            row.group,
            row.coordinator,
            row.coordinator_id,
            row.assignment_strategy,
            row.state,
            row.members,
            gw = group_width,
            cw = coordinator_width,
            sw_strategy = STRATEGY_WIDTH,
            stw = state_width
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TopicSummary;
    use crate::collectors::kube::Mirror;
    use crate::scan::types::{BrokerMetrics, MetricSample, PartitionSize};
    use std::collections::BTreeMap;

    fn reporter() -> TerminalReporter {
        TerminalReporter::new().with_colors(false)
    }

    fn topic(name: &str, partitions: u32, rf: u32, config: &str) -> TopicRecord {
        TopicRecord {
            name: name.to_string(),
            partition_count: partitions,
            replication_factor: rf,
            config: config.to_string(),
            partitions: Vec::new(),
        }
    }

    #[test]
    fn test_topics_are_aligned() {
        let report = Report::Topics(vec![PerCluster::new(
            "bku10",
            vec![topic("a", 3, 3, "retention.ms=1"), topic("orders", 12, 3, "")],
        )]);

        let out = reporter().render_report(&report);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "bku10");
        assert_eq!(lines[1], "a      : p=3  r=3  c=retention.ms=1");
        assert_eq!(lines[2], "orders : p=12  r=3  c=");
    }

    #[test]
    fn test_health_counts_and_sections() {
        let mut checks = BTreeMap::new();
        checks.insert(HealthCheck::UnderReplicated, vec!["Topic: t1 Partition: 0".to_string()]);
        checks.insert(HealthCheck::Unavailable, Vec::new());
        let report = Report::Health(vec![ClusterHealth {
            cluster: "bku10".to_string(),
            checks,
        }]);

        let out = reporter().render_report(&report);
        assert!(out.starts_with("bku10: URP:   1, UMISR:   0, AMISR:   0, UNAV:   0\n"));
        assert!(out.contains("\n URP:\n Topic: t1 Partition: 0\n"));

        let short = reporter().with_short(true).render_report(&report);
        assert_eq!(short.lines().count(), 1);
    }

    #[test]
    #[serial_test::serial]
    fn test_colors_are_per_reporter() {
        let report = Report::Topics(vec![PerCluster::new("bku10", vec![topic("orders", 1, 3, "")])]);

        colored::control::set_override(true);
        let colored_out = TerminalReporter::new().render_report(&report);
        let plain = reporter().render_report(&report);
        let colored_again = TerminalReporter::new().render_report(&report);
        colored::control::unset_override();

        assert!(colored_out.contains('\x1b'));
        assert!(!plain.contains('\x1b'));
        assert!(plain.starts_with("bku10"));
        // a plain reporter leaves later reporters untouched
        assert_eq!(colored_again, colored_out);
    }

    #[test]
    fn test_group_table_handles_empty_group() {
        let groups = vec![
            GroupRecord {
                name: "audit".to_string(),
                state: "audit bkuv1002.os.amadeus.net:9092 (2)  Empty 0".to_string(),
                ..Default::default()
            },
            GroupRecord {
                name: "billing".to_string(),
                state: "billing bkuv1001.os.amadeus.net:9092 (1) range Stable 3".to_string(),
                ..Default::default()
            },
            GroupRecord::named("no-state"),
        ];

        let out = group_table(&groups);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("GROUP    COORDINATOR (ID)"));
        assert!(lines[1].contains("( 2)  -"));
        assert!(lines[1].contains("Empty   0"));
        assert!(lines[2].contains("( 1)  range"));
        assert!(lines[2].ends_with("Stable  3"));
    }

    #[test]
    fn test_short_groups_print_names() {
        let report = Report::Groups {
            clusters: vec![PerCluster::new("bku10", vec![GroupRecord::named("a"), GroupRecord::named("b")])],
            detailed: true,
        };
        let out = reporter().with_short(true).render_report(&report);
        assert_eq!(out, "bku10\na\nb\n");
    }

    #[test]
    fn test_acl_block() {
        let mut acl = AclRecord::new("TOPIC", "orders", "LITERAL");
        acl.fold_permission("app", "*", "READ", "ALLOW");
        acl.fold_permission("app", "*", "DESCRIBE", "ALLOW");
        let report = Report::Acls(vec![PerCluster::new("bku10", vec![acl])]);

        let out = reporter().render_report(&report);
        assert_eq!(out, "Display acls of bku10\nTOPIC orders (LITERAL)\n\tALLOW R   D * app\n\n");
    }

    #[test]
    fn test_configs_hide_null_values() {
        let entries = vec![
            ConfigEntry {
                key: "compression.type".to_string(),
                value: "producer".to_string(),
                sensitive: false,
                synonyms: "{}".to_string(),
            },
            ConfigEntry {
                key: "ssl.key.password".to_string(),
                value: "null".to_string(),
                sensitive: true,
                synonyms: "{}".to_string(),
            },
        ];
        let report = Report::Configs {
            broker: 0,
            clusters: vec![PerCluster::new("bku10", entries)],
        };

        let out = reporter().with_short(true).render_report(&report);
        assert_eq!(out, "Config of bku10 (broker 0)\ncompression.type : producer\n");

        let all = reporter().with_show_null(true).render_report(&report);
        assert!(all.contains("ssl.key.password : null\nsynonym= {}\n"));
    }

    #[test]
    fn test_short_log_dirs_group_by_topic() {
        let record = LogDirRecord {
            broker: 1,
            log_dirs: vec!["/opt/kafkadata".to_string()],
            partitions: vec![
                PartitionSize {
                    partition: "orders-1".to_string(),
                    size: 20,
                },
                PartitionSize {
                    partition: "orders-0".to_string(),
                    size: 10,
                },
            ],
        };
        let report = Report::LogDirs(vec![PerCluster::new("bku10", vec![record])]);

        let out = reporter().with_short(true).render_report(&report);
        assert_eq!(out, "bku10:\n\tbroker: 1\n\t\torders: [0 10] [1 20] \n");
    }

    #[test]
    fn test_info_totals_only_for_several_clusters() {
        let mut node = BTreeMap::new();
        node.insert(
            "node_filesystem_size_bytes".to_string(),
            MetricSample {
                name: "node_filesystem_size_bytes".to_string(),
                value: "107374182400".to_string(),
                ..Default::default()
            },
        );
        let diagnostics = ClusterDiagnostics {
            cluster: "bku10".to_string(),
            topics: vec!["a".to_string()],
            log_dirs: Vec::new(),
            brokers: vec![BrokerMetrics {
                endpoint: "bkuv1000.os.amadeus.net:9092".to_string(),
                node,
                kafka: BTreeMap::new(),
            }],
        };

        let single = Report::info(vec![diagnostics.clone()], vec!["node_filesystem_size_bytes".to_string()]);
        let out = reporter().render_report(&single);
        assert!(!out.contains("Nb servers"));
        assert!(out.contains("node_filesystem_size_bytes :  107374182400"));

        let mut other = diagnostics;
        other.cluster = "bku11".to_string();
        let both = Report::info(vec![other.clone(), other], Vec::new());
        let out = reporter().with_short(true).render_report(&both);
        assert!(out.contains("Nb servers : 2, Nb of topics : 2 [0], disk total : 200G"));
    }

    #[test]
    fn test_kube_topics_summary_line() {
        let report = Report::KubeTopics(vec![KubeTopics {
            namespace: "kafka-prod".to_string(),
            cluster: "bkxx10".to_string(),
            summary: TopicSummary {
                topics: 2,
                partitions: 6,
                replicas: 18,
            },
            topics: vec![topic("orders", 3, 3, "")],
        }]);

        let out = reporter().with_short(true).render_report(&report);
        assert_eq!(out, "kafka-prod : bkxx10 [t=2 p=6 pr=18]\n\torders\n");
    }

    #[test]
    fn test_mirror_maker_line() {
        let mm = MirrorMaker2 {
            connect_cluster: "target".to_string(),
            mirrors: vec![Mirror {
                source_cluster: "source".to_string(),
                topics_pattern: "orders.*".to_string(),
                topics_blacklist_pattern: "tmp.*".to_string(),
            }],
        };
        let report = Report::MirrorMakers(vec![PerCluster::new("kafka-prod", vec![mm])]);

        let out = reporter().render_report(&report);
        assert_eq!(out, "kafka-prod:\n  target <- source [ orders.* BLACKLIST=tmp.* ]     \n");
    }
}
