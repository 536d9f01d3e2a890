pub mod acl;
pub mod config;
pub mod group;
pub mod health;
pub mod info;
pub mod kube;
pub mod partitions;
pub mod topic;

use std::sync::Arc;
use tracing::info;

use super::commands::GlobalArgs;
use super::utils::build_targets;
use crate::collectors::ShellGateway;
use crate::config::DiagConfig;
use crate::dispatch::{Dispatcher, EntityError};
use crate::scan::types::ClusterTarget;

// Re-export handler functions for convenience
pub use acl::handle_acl_command;
pub use config::handle_config_command;
pub use group::handle_group_command;
pub use health::handle_health_command;
pub use info::handle_info_command;
pub use kube::{handle_kgroup_command, handle_kmm2_command, handle_ktopic_command, handle_namespace_command};
pub use partitions::handle_partitions_command;
pub use topic::handle_topic_command;

/// Reachable clusters of a bootstrap-driven command, with the failures met so far
pub struct Session {
    pub dispatcher: Dispatcher<ShellGateway>,
    pub targets: Vec<ClusterTarget>,
    pub errors: Vec<EntityError>,
}

impl Session {
    /// Resolve the clusters named on the command line and drop the unreachable ones
    pub async fn open(args: &GlobalArgs, config: DiagConfig) -> Self {
        let (targets, mut errors) = build_targets(args, &config);
        let gateway = Arc::new(ShellGateway::from_config(&config));
        let dispatcher = Dispatcher::new(gateway, config);

        let gated = dispatcher.gate(targets).await;
        errors.extend(gated.errors);
        info!("Querying {} cluster(s)", gated.records.len());

        Self {
            dispatcher,
            targets: gated.records,
            errors,
        }
    }

    pub fn limit(&self) -> usize {
        self.dispatcher.config().max_concurrency
    }

    /// Target of a cluster name returned by a previous round
    pub fn target(&self, cluster: &str) -> Option<&ClusterTarget> {
        self.targets.iter().find(|t| t.name == cluster)
    }
}
