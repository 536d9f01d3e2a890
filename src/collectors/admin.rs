use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::metrics::fetch_metrics_page;
use super::{describe_command, execute, AdminQuery, CollectorError, CollectorResult, QueryGateway};
use crate::config::DiagConfig;
use crate::scan::probe::probe;
use crate::scan::types::ClusterTarget;

/// Runs the Kafka admin scripts against bootstrap endpoints, either on this host or
/// through `ssh <bastion>`.
pub struct ShellGateway {
    bin_dir: Option<PathBuf>,
    bastion: Option<String>,
    probe_timeout: Duration,
    admin_timeout: Option<Duration>,
    http: reqwest::Client,
}

impl Default for ShellGateway {
    fn default() -> Self {
        Self::from_config(&DiagConfig::default())
    }
}

impl ShellGateway {
    pub fn from_config(config: &DiagConfig) -> Self {
        Self {
            bin_dir: config.kafka_bin_dir.clone(),
            bastion: config.bastion.clone(),
            probe_timeout: config.probe_timeout(),
            admin_timeout: config.admin_timeout(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_bastion(mut self, bastion: Option<String>) -> Self {
        self.bastion = bastion;
        self
    }

    /// Program and arguments actually spawned for `query`
    fn command_line(&self, target: &ClusterTarget, query: &AdminQuery) -> (String, Vec<String>) {
        let program = query.program(self.bin_dir.as_deref());
        let args = query.args(&target.bootstrap());

        match &self.bastion {
            Some(bastion) => {
                let remote = std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .map(shell_quote)
                    .collect::<Vec<_>>()
                    .join(" ");
                ("ssh".to_string(), vec![bastion.clone(), remote])
            }
            None => (program, args),
        }
    }
}

#[async_trait]
impl QueryGateway for ShellGateway {
    async fn preflight(&self, target: &ClusterTarget) -> CollectorResult<()> {
        let reachable = probe(&target.endpoints, self.probe_timeout).await?;
        debug!("Cluster {} reachable through {}", target.name, reachable);
        Ok(())
    }

    async fn run_admin_query(&self, target: &ClusterTarget, query: &AdminQuery) -> CollectorResult<String> {
        let (program, args) = self.command_line(target, query);
        let rendered = describe_command(&program, &args);
        info!("Running `{}`", rendered);

        let mut command = Command::new(&program);
        command.args(&args);
        let output = execute(command, self.admin_timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("`{}` failed: {}", rendered, stderr);
            return Err(CollectorError::CommandFailed {
                command: rendered,
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn fetch_metrics(&self, host: &str, port: u16, timeout: Duration) -> CollectorResult<String> {
        fetch_metrics_page(&self.http, host, port, timeout).await
    }

    fn name(&self) -> &'static str {
        "ShellGateway"
    }
}

/// Quote one word for the remote shell
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:,=".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::types::HealthCheck;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn target() -> ClusterTarget {
        ClusterTarget::new("bku10", vec!["h1:9092".to_string(), "h2:9092".to_string()])
    }

    /// A fake `kafka-topics.sh` echoing its arguments, inside a temp bin dir
    fn fake_bin(script: &str, body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(script);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    fn gateway(bin: &TempDir) -> ShellGateway {
        let config = DiagConfig {
            kafka_bin_dir: Some(bin.path().to_path_buf()),
            ..Default::default()
        };
        ShellGateway::from_config(&config)
    }

    #[test]
    fn test_local_command_line() {
        let gw = ShellGateway::default();
        let (program, args) = gw.command_line(&target(), &AdminQuery::TopicHealth(HealthCheck::Unavailable));
        assert_eq!(program, "kafka-topics.sh");
        assert_eq!(
            args,
            vec!["--bootstrap-server", "h1:9092,h2:9092", "--describe", "--unavailable-partitions"]
        );
    }

    #[test]
    fn test_bastion_command_line() {
        let gw = ShellGateway::default().with_bastion(Some("jump".to_string()));
        let query = AdminQuery::TopicDescribe {
            topic: Some("it's".to_string()),
        };
        let (program, args) = gw.command_line(&target(), &query);
        assert_eq!(program, "ssh");
        assert_eq!(args[0], "jump");
        assert_eq!(
            args[1],
            r"kafka-topics.sh --bootstrap-server h1:9092,h2:9092 --describe --topic 'it'\''s'"
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_stdout_is_returned() {
        let bin = fake_bin("kafka-topics.sh", "echo \"$@\"");
        let out = gateway(&bin).run_admin_query(&target(), &AdminQuery::TopicList).await.unwrap();
        assert_eq!(out.trim(), "--bootstrap-server h1:9092,h2:9092 --list");
    }

    #[tokio::test]
    #[serial]
    async fn test_non_zero_exit_carries_stderr() {
        let bin = fake_bin("kafka-acls.sh", "echo 'not authorized' >&2; exit 3");
        let result = gateway(&bin)
            .run_admin_query(&target(), &AdminQuery::AclList { topic: None })
            .await;
        match result {
            Err(CollectorError::CommandFailed { status, stderr, .. }) => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "not authorized");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_admin_timeout_is_opt_in() {
        let bin = fake_bin("kafka-topics.sh", "sleep 5");
        let config = DiagConfig {
            kafka_bin_dir: Some(bin.path().to_path_buf()),
            admin_timeout_secs: Some(1),
            ..Default::default()
        };
        let result = ShellGateway::from_config(&config)
            .run_admin_query(&target(), &AdminQuery::TopicList)
            .await;
        assert!(matches!(result, Err(CollectorError::Timeout { timeout_ms: 1000 })));
    }

    #[tokio::test]
    async fn test_preflight_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = ClusterTarget::new("bku10", vec![format!("127.0.0.1:{}", port)]);
        let result = ShellGateway::default().preflight(&target).await;
        assert!(matches!(result, Err(CollectorError::ConnectionFailed(_))));
    }
}
