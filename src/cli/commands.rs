use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kstat",
    about = "Kafka cluster diagnostics: topics, groups, ACLs, configs, log dirs and metrics across clusters",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for logs
    #[arg(long, default_value = "text", global = true)]
    pub log_format: String,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every diagnostic command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Comma-separated cluster identifiers (e.g. bku10,bkt20)
    #[arg(short, long, global = true, env = "KSTAT_CLUSTER")]
    pub cluster: Option<String>,

    /// Comma-separated bootstrap servers (fqdn:port); ignored when --cluster is set
    #[arg(short, long, global = true)]
    pub broker: Option<String>,

    /// Condensed output
    #[arg(short, long, global = true)]
    pub short: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "terminal", global = true)]
    pub format: ReportFormat,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Reachability probe timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Metrics exporter timeout in milliseconds
    #[arg(long, global = true)]
    pub http_timeout: Option<u64>,

    /// Bound on admin script runtime in seconds (unbounded when unset)
    #[arg(long, global = true)]
    pub admin_timeout: Option<u64>,

    /// Maximum number of queries in flight
    #[arg(long, global = true)]
    pub max_concurrency: Option<usize>,

    /// YAML configuration file (default: ~/.kstat.yaml)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// SSH bastion alias (from ~/.ssh/config) to run the admin scripts through
    #[arg(long, global = true)]
    pub bastion: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List or describe topics
    Topic {
        /// Comma-separated topics to describe (all topics when not set)
        #[arg(short, long)]
        topic: Option<String>,

        /// Only list topic names
        #[arg(long)]
        sum: bool,

        #[command(flatten)]
        checks: HealthChecks,
    },

    /// Partition health of every cluster (URP, UMISR, AMISR, UNAV)
    Health {
        #[command(flatten)]
        checks: HealthChecks,
    },

    /// List consumer groups, or describe the given ones
    Group {
        /// Comma-separated groups to describe
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Display ACLs, optionally restricted to some topics
    Acl {
        /// Comma-separated topics
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Display the configuration of a broker
    Config {
        /// Broker id
        #[arg(short, long, default_value_t = 0)]
        number: i32,

        /// Also display keys whose value is null
        #[arg(long)]
        null: bool,
    },

    /// Partitions hosted by each broker, with their size
    Partitions {
        /// Comma-separated broker ids
        #[arg(long)]
        broker_list: Option<String>,
    },

    /// Topic count, partitions per broker, disk usage and Kafka version of every cluster
    Info,

    /// Describe topics of Kafka clusters running in Kubernetes
    Ktopic {
        /// Comma-separated namespaces
        #[arg(short, long)]
        namespace: Option<String>,

        /// Comma-separated topics to display
        #[arg(long)]
        topics: Option<String>,
    },

    /// Consumer groups of Kafka clusters running in Kubernetes
    Kgroup {
        /// Comma-separated namespaces
        #[arg(short, long)]
        namespace: Option<String>,

        /// Comma-separated groups to describe
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Kafka namespaces and their pods
    Namespace {
        /// Comma-separated namespaces
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// MirrorMaker2 resources of Kafka namespaces
    Kmm2 {
        /// Comma-separated namespaces
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show information about kstat
    About,
}

/// Partition health checks to run; none selected means all of them
#[derive(Args, Debug, Clone, Default)]
pub struct HealthChecks {
    /// Under-replicated partitions
    #[arg(long)]
    pub urp: bool,

    /// Under-min-ISR partitions
    #[arg(long)]
    pub umisr: bool,

    /// At-min-ISR partitions
    #[arg(long)]
    pub amisr: bool,

    /// Unavailable partitions
    #[arg(long)]
    pub uav: bool,

    /// Every check
    #[arg(long)]
    pub all: bool,
}

impl HealthChecks {
    pub fn any(&self) -> bool {
        self.urp || self.umisr || self.amisr || self.uav || self.all
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}
