use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default name of the per-user configuration file, looked up in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".kstat.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Run-wide diagnostics configuration, handed to the gateways and the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// TCP connect timeout of the reachability probe, in milliseconds
    pub probe_timeout_ms: u64,

    /// Timeout of a metrics exporter request, in milliseconds
    pub http_timeout_ms: u64,

    /// Upper bound on in-flight tasks per fan-out round
    pub max_concurrency: usize,

    /// Optional bound on an admin script invocation. Unset means the call blocks until
    /// the external process exits.
    pub admin_timeout_secs: Option<u64>,

    /// Domain suffix shared by every broker hostname (e.g. ".os.amadeus.net")
    pub domain: String,

    pub broker_port: u16,

    pub brokers_per_cluster: u8,

    /// Node exporter port
    pub node_metrics_port: u16,

    /// Kafka JMX exporter port
    pub kafka_metrics_port: u16,

    /// Mount point of the Kafka data filesystem, used to filter node_filesystem_* samples
    pub data_mount: String,

    /// Directory holding the kafka-*.sh scripts. Unset means they are on PATH.
    pub kafka_bin_dir: Option<PathBuf>,

    /// SSH alias to hop through before running admin scripts
    pub bastion: Option<String>,

    pub kubectl: String,

    /// Container of the broker pod that admin scripts are exec'd in
    pub kafka_container: String,

    /// Also display config keys whose value is null
    pub show_null: bool,

    /// Condensed output
    pub short: bool,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 500,
            http_timeout_ms: 2000,
            max_concurrency: 16,
            admin_timeout_secs: None,
            domain: ".os.amadeus.net".to_string(),
            broker_port: 9092,
            brokers_per_cluster: 3,
            node_metrics_port: 50700,
            kafka_metrics_port: 50721,
            data_mount: "/opt/kafkadata".to_string(),
            kafka_bin_dir: None,
            bastion: None,
            kubectl: "kubectl".to_string(),
            kafka_container: "kafka".to_string(),
            show_null: false,
            short: false,
        }
    }
}

impl DiagConfig {
    /// Load defaults, then the YAML file (explicit path, or ~/.kstat.yaml when present),
    /// then KSTAT_* environment variables
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();

        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => match dirs::home_dir().map(|h| h.join(DEFAULT_CONFIG_FILE)) {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from KSTAT_* environment variables; unparseable values are ignored
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("KSTAT_PROBE_TIMEOUT_MS") {
            self.probe_timeout_ms = v;
        }
        if let Some(v) = env_parse("KSTAT_HTTP_TIMEOUT_MS") {
            self.http_timeout_ms = v;
        }
        if let Some(v) = env_parse("KSTAT_MAX_CONCURRENCY") {
            self.max_concurrency = v;
        }
        if let Some(v) = env_parse("KSTAT_ADMIN_TIMEOUT_SECS") {
            self.admin_timeout_secs = Some(v);
        }
        if let Ok(domain) = env::var("KSTAT_DOMAIN") {
            self.domain = domain;
        }
        if let Some(v) = env_parse("KSTAT_BROKER_PORT") {
            self.broker_port = v;
        }
        if let Ok(dir) = env::var("KSTAT_KAFKA_BIN_DIR") {
            self.kafka_bin_dir = Some(PathBuf::from(dir));
        }
        if let Ok(bastion) = env::var("KSTAT_BASTION") {
            if !bastion.trim().is_empty() {
                self.bastion = Some(bastion);
            }
        }
        if let Ok(kubectl) = env::var("KSTAT_KUBECTL") {
            self.kubectl = kubectl;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid("probe timeout must be greater than 0".to_string()));
        }
        if self.http_timeout_ms == 0 {
            return Err(ConfigError::Invalid("HTTP timeout must be greater than 0".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max concurrency must be greater than 0".to_string()));
        }
        if self.brokers_per_cluster == 0 {
            return Err(ConfigError::Invalid("brokers per cluster must be greater than 0".to_string()));
        }
        if self.domain.trim().is_empty() {
            return Err(ConfigError::Invalid("domain suffix is empty".to_string()));
        }
        if self.admin_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("admin timeout must be greater than 0 when set".to_string()));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn admin_timeout(&self) -> Option<Duration> {
        self.admin_timeout_secs.map(Duration::from_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn setup_clean_env() {
        for key in [
            "KSTAT_PROBE_TIMEOUT_MS",
            "KSTAT_HTTP_TIMEOUT_MS",
            "KSTAT_MAX_CONCURRENCY",
            "KSTAT_ADMIN_TIMEOUT_SECS",
            "KSTAT_DOMAIN",
            "KSTAT_BROKER_PORT",
            "KSTAT_KAFKA_BIN_DIR",
            "KSTAT_BASTION",
            "KSTAT_KUBECTL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = DiagConfig::default();

        assert_eq!(config.probe_timeout_ms, 500);
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.admin_timeout_secs, None);
        assert_eq!(config.domain, ".os.amadeus.net");
        assert_eq!(config.broker_port, 9092);
        assert_eq!(config.brokers_per_cluster, 3);
        assert!(!config.show_null);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = DiagConfig {
            max_concurrency: 0,
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max concurrency"));
    }

    #[test]
    fn test_validate_rejects_zero_admin_timeout() {
        let config = DiagConfig {
            admin_timeout_secs: Some(0),
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrency: 4\ndomain: .example.org\nbastion: jump").unwrap();

        let config = DiagConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.domain, ".example.org");
        assert_eq!(config.bastion, Some("jump".to_string()));
        // untouched fields keep their defaults
        assert_eq!(config.broker_port, 9092);
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrency: [not a number").unwrap();

        let result = DiagConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        setup_clean_env();
        env::set_var("KSTAT_MAX_CONCURRENCY", "8");
        env::set_var("KSTAT_ADMIN_TIMEOUT_SECS", "30");
        env::set_var("KSTAT_DOMAIN", ".lab.local");

        let mut config = DiagConfig::default();
        config.apply_env();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.admin_timeout_secs, Some(30));
        assert_eq!(config.domain, ".lab.local");

        setup_clean_env();
    }

    #[test]
    #[serial]
    fn test_env_invalid_numbers_ignored() {
        setup_clean_env();
        env::set_var("KSTAT_PROBE_TIMEOUT_MS", "soon");
        env::set_var("KSTAT_BASTION", "  ");

        let mut config = DiagConfig::default();
        config.apply_env();
        assert_eq!(config.probe_timeout_ms, 500);
        assert_eq!(config.bastion, None);

        setup_clean_env();
    }
}
