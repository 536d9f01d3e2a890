use anyhow::Result;

use super::Session;
use crate::cli::commands::GlobalArgs;
use crate::cli::utils::emit_report;
use crate::config::DiagConfig;
use crate::parse::metrics::{kafka_metric_queries, node_metric_queries};
use crate::report::Report;

pub async fn handle_info_command(args: &GlobalArgs, config: DiagConfig) -> Result<()> {
    let metrics: Vec<String> = node_metric_queries(&config.data_mount)
        .into_iter()
        .chain(kafka_metric_queries())
        .map(|q| q.name)
        .collect();

    let mut session = Session::open(args, config).await;
    let gathered = session.dispatcher.cluster_info(&session.targets).await;
    session.errors.extend(gathered.errors);

    let report = Report::info(gathered.records, metrics);
    emit_report(&report, &session.errors, args, session.dispatcher.config())
}
