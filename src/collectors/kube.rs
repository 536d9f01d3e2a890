//! Cluster access through `kubectl`, for brokers running as pods.
//!
//! Admin scripts run inside the first Kafka pod of a cluster with `kubectl exec`,
//! against `localhost:9092`. Namespace and pod discovery and the Strimzi
//! MirrorMaker2 resources go through `kubectl get -o json`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{describe_command, execute, AdminQuery, CollectorError, CollectorResult, QueryGateway};
use crate::config::DiagConfig;
use crate::scan::types::ClusterTarget;

/// Bootstrap seen from inside a broker pod
pub const POD_BOOTSTRAP: &str = "localhost:9092";
const POD_BIN_DIR: &str = "bin";
const MM2_RESOURCE: &str = "kafkamirrormaker2s.kafka.strimzi.io";

/// `<4 chars><2-3 digits>-kafka-N` or `-zookeeper-N`
static BROKER_POD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S{4})(\d{2,3})(-kafka|-zookeeper)-(\d{1,2})$").unwrap_or_else(|_| unreachable!())
});

static MIRRORMAKER_POD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S*)(-mirrormaker2)(.*)-(\S{5})$").unwrap_or_else(|_| unreachable!())
});

static OTHER_POD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S*)(-kafka|-zookeeper)-(\d{1,2})$").unwrap_or_else(|_| unreachable!())
});

static KAFKA_CLUSTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S{4}\d{2,3})-kafka-").unwrap_or_else(|_| unreachable!()));

pub struct KubeGateway {
    kubectl: String,
    container: String,
    admin_timeout: Option<Duration>,
}

impl Default for KubeGateway {
    fn default() -> Self {
        Self::from_config(&DiagConfig::default())
    }
}

impl KubeGateway {
    pub fn from_config(config: &DiagConfig) -> Self {
        Self {
            kubectl: config.kubectl.clone(),
            container: config.kafka_container.clone(),
            admin_timeout: config.admin_timeout(),
        }
    }

    /// Run kubectl and return stdout. Anything on stderr fails the call.
    async fn kubectl(&self, args: Vec<String>) -> CollectorResult<String> {
        let rendered = describe_command(&self.kubectl, &args);
        debug!("Running `{}`", rendered);

        let mut command = Command::new(&self.kubectl);
        command.args(&args);
        let output = execute(command, self.admin_timeout).await?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            return Err(CollectorError::Stderr {
                command: rendered,
                stderr,
            });
        }
        if !output.status.success() {
            return Err(CollectorError::CommandFailed {
                command: rendered,
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn get_json(&self, args: &[&str]) -> CollectorResult<Value> {
        let mut args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        args.extend(["-o".to_string(), "json".to_string()]);
        let raw = self.kubectl(args).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Kafka namespaces, optionally restricted to `wanted`
    pub async fn kafka_namespaces(&self, wanted: &[String]) -> CollectorResult<Vec<String>> {
        let list = self.get_json(&["get", "namespaces"]).await?;
        let namespaces = item_names(&list)
            .into_iter()
            .filter(|ns| is_kafka_namespace(ns))
            .filter(|ns| wanted.is_empty() || wanted.contains(ns))
            .collect::<Vec<_>>();
        info!("Found {} Kafka namespaces", namespaces.len());
        Ok(namespaces)
    }

    pub async fn pods(&self, namespace: &str) -> CollectorResult<Vec<String>> {
        let list = self.get_json(&["get", "pods", "-n", namespace]).await?;
        let pods = item_names(&list);
        debug!("{} pods in {}", pods.len(), namespace);
        Ok(pods)
    }

    pub async fn mirror_makers(&self, namespace: &str) -> CollectorResult<Vec<MirrorMaker2>> {
        let list = self.get_json(&["get", MM2_RESOURCE, "-n", namespace]).await?;
        Ok(parse_mirror_makers(&list))
    }

    /// One target per Kafka cluster of `namespace`, each with its broker pods
    pub async fn cluster_targets(&self, namespace: &str, clusters: &[String]) -> CollectorResult<Vec<ClusterTarget>> {
        let pods = self.pods(namespace).await?;
        Ok(cluster_targets(namespace, &pods, clusters))
    }

    /// A single target covering every broker pod of `namespace`
    pub async fn namespace_target(&self, namespace: &str) -> CollectorResult<ClusterTarget> {
        let pods = self.pods(namespace).await?;
        let brokers = kafka_pods(&pods).into_iter().map(str::to_string).collect();
        Ok(ClusterTarget::new(namespace, brokers).with_role(namespace))
    }

    fn exec_args(&self, target: &ClusterTarget, query: &AdminQuery) -> CollectorResult<Vec<String>> {
        let namespace = target
            .role
            .as_deref()
            .ok_or_else(|| CollectorError::ConfigurationError(format!("no namespace for {}", target.name)))?;
        let pod = target
            .endpoints
            .first()
            .ok_or_else(|| CollectorError::ConfigurationError(format!("no kafka pods in {}", namespace)))?;

        let mut args = vec![
            "exec".to_string(),
            "-n".to_string(),
            namespace.to_string(),
            pod.clone(),
            "-c".to_string(),
            self.container.clone(),
            "--".to_string(),
            format!("{}/{}", POD_BIN_DIR, query.script()),
        ];
        args.extend(query.args(POD_BOOTSTRAP));
        Ok(args)
    }
}

#[async_trait]
impl QueryGateway for KubeGateway {
    async fn preflight(&self, target: &ClusterTarget) -> CollectorResult<()> {
        if target.endpoints.is_empty() {
            let namespace = target.role.as_deref().unwrap_or(&target.name);
            return Err(CollectorError::ConfigurationError(format!("no kafka pods in {}", namespace)));
        }
        Ok(())
    }

    async fn run_admin_query(&self, target: &ClusterTarget, query: &AdminQuery) -> CollectorResult<String> {
        let args = self.exec_args(target, query)?;
        self.kubectl(args).await
    }

    async fn fetch_metrics(&self, _host: &str, _port: u16, _timeout: Duration) -> CollectorResult<String> {
        Err(CollectorError::Unsupported("metrics scraping"))
    }

    fn name(&self) -> &'static str {
        "KubeGateway"
    }
}

/// A Strimzi `KafkaMirrorMaker2` resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorMaker2 {
    pub connect_cluster: String,
    pub mirrors: Vec<Mirror>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub source_cluster: String,
    pub topics_pattern: String,
    pub topics_blacklist_pattern: String,
}

pub fn parse_mirror_makers(list: &Value) -> Vec<MirrorMaker2> {
    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    items(list)
        .iter()
        .map(|item| {
            let spec = item.get("spec").cloned().unwrap_or(Value::Null);
            let mirrors = spec
                .get("mirrors")
                .and_then(Value::as_array)
                .map(|mirrors| {
                    mirrors
                        .iter()
                        .map(|m| Mirror {
                            source_cluster: text(m, "sourceCluster"),
                            topics_pattern: text(m, "topicsPattern"),
                            topics_blacklist_pattern: text(m, "topicsBlacklistPattern"),
                        })
                        .collect()
                })
                .unwrap_or_default();
            MirrorMaker2 {
                connect_cluster: text(&spec, "connectCluster"),
                mirrors,
            }
        })
        .collect()
}

fn items(list: &Value) -> &[Value] {
    list.get("items").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn item_names(list: &Value) -> Vec<String> {
    items(list)
        .iter()
        .filter_map(|item| item.pointer("/metadata/name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Starts or ends with `kafka`, admin namespaces excluded
pub fn is_kafka_namespace(name: &str) -> bool {
    (name.starts_with("kafka") || name.ends_with("kafka")) && !name.contains("-admin")
}

/// Broker pods of a namespace (zookeeper pods excluded)
pub fn kafka_pods(pods: &[String]) -> Vec<&str> {
    pods.iter()
        .map(String::as_str)
        .filter(|p| BROKER_POD_REGEX.is_match(p) && p.contains("-kafka-"))
        .collect()
}

/// Group pods by component (`bkxx10-kafka`, `mm-mirrormaker2`, ...) with their ordinals
pub fn pod_components(pods: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut components: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pod in pods {
        let entry = if let Some(caps) = BROKER_POD_REGEX.captures(pod) {
            Some((format!("{}{}{}", &caps[1], &caps[2], &caps[3]), caps[4].to_string()))
        } else if let Some(caps) = MIRRORMAKER_POD_REGEX.captures(pod) {
            Some((caps[1].to_string(), caps[4].to_string()))
        } else {
            OTHER_POD_REGEX
                .captures(pod)
                .map(|caps| (format!("{}{}", &caps[1], &caps[2]), caps[3].to_string()))
        };

        if let Some((component, ordinal)) = entry {
            components.entry(component).or_default().push(ordinal);
        }
    }
    components
}

/// Targets for every Kafka cluster found among `pods`, in first-seen order.
///
/// `clusters` restricts the result to the named cluster prefixes.
pub fn cluster_targets(namespace: &str, pods: &[String], clusters: &[String]) -> Vec<ClusterTarget> {
    let mut targets: Vec<ClusterTarget> = Vec::new();
    for pod in kafka_pods(pods) {
        let Some(caps) = KAFKA_CLUSTER_REGEX.captures(pod) else {
            continue;
        };
        let cluster = &caps[1];
        if !clusters.is_empty() && !clusters.iter().any(|c| c == cluster) {
            continue;
        }

        match targets.iter_mut().find(|t| t.name == cluster) {
            Some(target) => target.endpoints.push(pod.to_string()),
            None => targets.push(ClusterTarget::new(cluster, vec![pod.to_string()]).with_role(namespace)),
        }
    }

    if targets.is_empty() {
        warn!("No kafka pods in {}", namespace);
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kafka_namespaces() {
        assert!(is_kafka_namespace("kafka-prd"));
        assert!(is_kafka_namespace("billing-kafka"));
        assert!(!is_kafka_namespace("kafka-admin-tools"));
        assert!(!is_kafka_namespace("monitoring"));
    }

    #[test]
    fn test_pod_components() {
        let pods = names(&[
            "bkxp10-kafka-0",
            "bkxp10-kafka-1",
            "bkxp10-zookeeper-0",
            "mm-mirrormaker2-7d9f8-ab12c",
            "strimzi-kafka-2",
            "entity-operator-5c6",
        ]);
        let components = pod_components(&pods);

        assert_eq!(components["bkxp10-kafka"], vec!["0", "1"]);
        assert_eq!(components["bkxp10-zookeeper"], vec!["0"]);
        assert_eq!(components["mm"], vec!["ab12c"]);
        assert_eq!(components["strimzi-kafka"], vec!["2"]);
        assert_eq!(components.len(), 4);
    }

    #[test]
    fn test_cluster_targets_one_per_prefix() {
        let pods = names(&[
            "bkxp10-kafka-0",
            "bkxp10-zookeeper-0",
            "bkxp10-kafka-1",
            "bkxp110-kafka-0",
        ]);
        let targets = cluster_targets("kafka-prd", &pods, &[]);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "bkxp10");
        assert_eq!(targets[0].endpoints, vec!["bkxp10-kafka-0", "bkxp10-kafka-1"]);
        assert_eq!(targets[0].role.as_deref(), Some("kafka-prd"));

        let only = cluster_targets("kafka-prd", &pods, &names(&["bkxp110"]));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "bkxp110");
    }

    #[test]
    fn test_exec_args() {
        let target = ClusterTarget::new("bkxp10", names(&["bkxp10-kafka-0"])).with_role("kafka-prd");
        let args = KubeGateway::default()
            .exec_args(&target, &AdminQuery::GroupStateAll)
            .unwrap();
        assert_eq!(
            args,
            names(&[
                "exec",
                "-n",
                "kafka-prd",
                "bkxp10-kafka-0",
                "-c",
                "kafka",
                "--",
                "bin/kafka-consumer-groups.sh",
                "--bootstrap-server",
                "localhost:9092",
                "--describe",
                "--all-groups",
                "--verbose",
                "--state",
            ])
        );
    }

    #[tokio::test]
    async fn test_preflight_without_pods() {
        let target = ClusterTarget::new("kafka-prd", vec![]).with_role("kafka-prd");
        assert!(KubeGateway::default().preflight(&target).await.is_err());
    }

    #[test]
    fn test_mirror_makers() {
        let list = json!({
            "items": [{
                "metadata": {"name": "mm2"},
                "spec": {
                    "connectCluster": "target",
                    "mirrors": [
                        {"sourceCluster": "source-a", "topicsPattern": "orders.*", "topicsBlacklistPattern": "orders.tmp"},
                        {"sourceCluster": "source-b", "topicsPattern": ".*"}
                    ]
                }
            }]
        });
        let mm2 = parse_mirror_makers(&list);
        assert_eq!(mm2.len(), 1);
        assert_eq!(mm2[0].connect_cluster, "target");
        assert_eq!(mm2[0].mirrors[0].topics_blacklist_pattern, "orders.tmp");
        assert_eq!(mm2[0].mirrors[1].source_cluster, "source-b");
        assert_eq!(mm2[0].mirrors[1].topics_blacklist_pattern, "");
    }
}
