use anyhow::{Context, Result};

use super::Session;
use crate::cli::commands::GlobalArgs;
use crate::cli::utils::{emit_report, list_arg};
use crate::config::DiagConfig;
use crate::dispatch::fan_out;
use crate::report::Report;
use crate::scan::types::{ClusterTarget, PerCluster};

pub async fn handle_partitions_command(
    args: &GlobalArgs,
    config: DiagConfig,
    broker_list: Option<String>,
) -> Result<()> {
    let brokers = parse_broker_ids(broker_list.as_deref())?;
    let session = Session::open(args, config).await;
    let brokers = brokers.as_deref();
    let dispatcher = &session.dispatcher;

    let items: Vec<&ClusterTarget> = session.targets.iter().collect();
    let rounds = fan_out(items, session.limit(), |target| async move {
        let outcome = dispatcher.log_dirs(target, brokers).await;
        (PerCluster::new(&target.name, outcome.records), outcome.errors)
    })
    .await;

    let mut errors = session.errors.clone();
    let mut clusters = Vec::new();
    for (round, round_errors) in rounds {
        clusters.push(round);
        errors.extend(round_errors);
    }

    emit_report(&Report::LogDirs(clusters), &errors, args, session.dispatcher.config())
}

/// `--broker-list 0,1,2`; unset or empty means every broker
pub fn parse_broker_ids(value: Option<&str>) -> Result<Option<Vec<i32>>> {
    let ids = list_arg(value)
        .iter()
        .map(|id| id.parse::<i32>().with_context(|| format!("Invalid broker id: {}", id)))
        .collect::<Result<Vec<_>>>()?;
    Ok(if ids.is_empty() { None } else { Some(ids) })
}
