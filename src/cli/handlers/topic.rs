use anyhow::Result;
use tracing::info;

use super::{handle_health_command, Session};
use crate::aggregate::merge_topic_rounds;
use crate::cli::commands::{GlobalArgs, HealthChecks};
use crate::cli::utils::{emit_report, list_arg};
use crate::config::DiagConfig;
use crate::dispatch::fan_out;
use crate::report::Report;
use crate::scan::types::{ClusterTarget, PerCluster};

pub async fn handle_topic_command(
    args: &GlobalArgs,
    config: DiagConfig,
    topic: Option<String>,
    sum: bool,
    checks: HealthChecks,
) -> Result<()> {
    if checks.any() {
        return handle_health_command(args, config, checks).await;
    }

    let mut session = Session::open(args, config).await;
    let wanted = list_arg(topic.as_deref());

    let names: Vec<PerCluster<Vec<String>>> = if wanted.is_empty() {
        let listed = session.dispatcher.list_topics(&session.targets).await;
        session.errors.extend(listed.errors);
        listed.records
    } else {
        session
            .targets
            .iter()
            .map(|t| PerCluster::new(&t.name, wanted.clone()))
            .collect()
    };

    if sum {
        let report = Report::TopicNames(names);
        return emit_report(&report, &session.errors, args, session.dispatcher.config());
    }

    let items: Vec<(&ClusterTarget, &Vec<String>)> = names
        .iter()
        .filter_map(|n| session.target(&n.cluster).map(|t| (t, &n.records)))
        .collect();
    let dispatcher = &session.dispatcher;

    let rounds = fan_out(items, session.limit(), |(target, topics)| async move {
        info!("{}: describing {} topic(s)", target.name, topics.len());
        let described = dispatcher.describe_topics(target, topics).await;
        (PerCluster::new(&target.name, described.records), described.errors)
    })
    .await;

    let mut errors = session.errors.clone();
    let mut clusters = Vec::new();
    for (round, round_errors) in rounds {
        clusters.push(round);
        errors.extend(round_errors);
    }

    let report = Report::Topics(merge_topic_rounds(clusters));
    emit_report(&report, &errors, args, session.dispatcher.config())
}
