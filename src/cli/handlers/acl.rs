use anyhow::Result;

use super::Session;
use crate::aggregate::sort_acls;
use crate::cli::commands::GlobalArgs;
use crate::cli::utils::{emit_report, list_arg};
use crate::config::DiagConfig;
use crate::dispatch::fan_out;
use crate::report::Report;
use crate::scan::types::{ClusterTarget, PerCluster};

pub async fn handle_acl_command(args: &GlobalArgs, config: DiagConfig, topic: Option<String>) -> Result<()> {
    let session = Session::open(args, config).await;
    let topics = list_arg(topic.as_deref());
    let topics = &topics;
    let dispatcher = &session.dispatcher;

    let items: Vec<&ClusterTarget> = session.targets.iter().collect();
    let rounds = fan_out(items, session.limit(), |target| async move {
        let mut outcome = dispatcher.acls(target, topics).await;
        sort_acls(&mut outcome.records);
        (PerCluster::new(&target.name, outcome.records), outcome.errors)
    })
    .await;

    let mut errors = session.errors.clone();
    let mut clusters = Vec::new();
    for (round, round_errors) in rounds {
        clusters.push(round);
        errors.extend(round_errors);
    }

    emit_report(&Report::Acls(clusters), &errors, args, session.dispatcher.config())
}
