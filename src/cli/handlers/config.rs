use anyhow::Result;
use tracing::info;

use super::Session;
use crate::aggregate::sort_configs;
use crate::cli::commands::GlobalArgs;
use crate::cli::utils::emit_report;
use crate::config::DiagConfig;
use crate::dispatch::fan_out;
use crate::report::Report;
use crate::scan::types::{ClusterTarget, PerCluster};

pub async fn handle_config_command(args: &GlobalArgs, mut config: DiagConfig, broker: i32, null: bool) -> Result<()> {
    if null {
        config.show_null = true;
    }
    let session = Session::open(args, config).await;
    info!("Reading configuration of broker {}", broker);
    let dispatcher = &session.dispatcher;

    let items: Vec<&ClusterTarget> = session.targets.iter().collect();
    let rounds = fan_out(items, session.limit(), |target| async move {
        let mut outcome = dispatcher.broker_config(target, broker).await;
        sort_configs(&mut outcome.records);
        (PerCluster::new(&target.name, outcome.records), outcome.errors)
    })
    .await;

    let mut errors = session.errors.clone();
    let mut clusters = Vec::new();
    for (round, round_errors) in rounds {
        clusters.push(round);
        errors.extend(round_errors);
    }

    let report = Report::Configs { broker, clusters };
    emit_report(&report, &errors, args, session.dispatcher.config())
}
