use anyhow::Result;
use tracing::info;

use super::Session;
use crate::aggregate::merge_group_rounds;
use crate::cli::commands::GlobalArgs;
use crate::cli::utils::{emit_report, list_arg};
use crate::collectors::GroupDetail;
use crate::config::DiagConfig;
use crate::dispatch::fan_out;
use crate::report::Report;
use crate::scan::types::{ClusterTarget, GroupRecord, PerCluster};

pub async fn handle_group_command(args: &GlobalArgs, config: DiagConfig, group: Option<String>) -> Result<()> {
    let mut session = Session::open(args, config).await;
    let wanted = list_arg(group.as_deref());
    let detailed = !wanted.is_empty();

    let listed: Vec<PerCluster<Vec<GroupRecord>>> = if detailed {
        session
            .targets
            .iter()
            .map(|t| PerCluster::new(&t.name, wanted.iter().map(GroupRecord::named).collect()))
            .collect()
    } else {
        let listed = session.dispatcher.list_groups(&session.targets).await;
        session.errors.extend(listed.errors);
        listed.records
    };

    // Names are all a short listing needs
    let details: &[GroupDetail] = match (detailed, session.dispatcher.config().short) {
        (true, _) => &GroupDetail::ALL,
        (false, false) => &[GroupDetail::State],
        (false, true) => &[],
    };

    let items: Vec<(&ClusterTarget, Vec<GroupRecord>)> = listed
        .into_iter()
        .filter_map(|round| session.target(&round.cluster).map(|t| (t, round.records)))
        .collect();
    let dispatcher = &session.dispatcher;

    let rounds = fan_out(items, session.limit(), |(target, mut groups)| async move {
        if !details.is_empty() {
            info!("{}: describing {} group(s)", target.name, groups.len());
        }
        let errors = dispatcher.fill_groups(target, &mut groups, details).await;
        (PerCluster::new(&target.name, groups), errors)
    })
    .await;

    let mut errors = session.errors.clone();
    let mut clusters = Vec::new();
    for (round, round_errors) in rounds {
        clusters.push(round);
        errors.extend(round_errors);
    }

    let report = Report::Groups {
        clusters: merge_group_rounds(clusters),
        detailed,
    };
    emit_report(&report, &errors, args, session.dispatcher.config())
}
