//! Commands against Kafka clusters running in Kubernetes namespaces.
//!
//! Admin scripts run inside a broker pod through `kubectl exec`; namespaces are
//! walked concurrently and a failing namespace never stops the others.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use crate::aggregate::{merge_group_rounds, sort_topics, TopicSummary};
use crate::cli::commands::GlobalArgs;
use crate::cli::utils::{emit_report, list_arg};
use crate::collectors::kube::pod_components;
use crate::collectors::{CollectorError, GroupDetail, KubeGateway};
use crate::config::DiagConfig;
use crate::dispatch::{fan_out, Dispatcher, EntityError, ErrorKind, Outcome};
use crate::report::{KubeTopics, NamespacePods, Report};
use crate::scan::types::{ClusterTarget, GroupRecord, PerCluster};

fn gateway_error(namespace: &str, entity: &str, e: CollectorError) -> EntityError {
    let err = EntityError::new(namespace, entity, ErrorKind::Gateway, e);
    error!("{}", err);
    err
}

async fn kafka_namespaces(gateway: &KubeGateway, namespace: Option<&str>) -> Result<Vec<String>> {
    let wanted = list_arg(namespace);
    gateway
        .kafka_namespaces(&wanted)
        .await
        .context("Failed to list Kubernetes namespaces")
}

/// Run `task` for every namespace and gather its records
async fn per_namespace<T, F, Fut>(namespaces: Vec<String>, limit: usize, task: F) -> Outcome<Vec<T>>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<T, EntityError>>,
{
    Outcome::from_results(fan_out(namespaces, limit, task).await)
}

pub async fn handle_namespace_command(args: &GlobalArgs, config: DiagConfig, namespace: Option<String>) -> Result<()> {
    let gateway = KubeGateway::from_config(&config);
    let namespaces = kafka_namespaces(&gateway, namespace.as_deref()).await?;
    let gateway = &gateway;

    let outcome = per_namespace(namespaces, config.max_concurrency, |ns| async move {
        let pods = gateway.pods(&ns).await.map_err(|e| gateway_error(&ns, "pods", e))?;
        Ok::<_, EntityError>(NamespacePods {
            components: pod_components(&pods),
            namespace: ns,
        })
    })
    .await;

    emit_report(&Report::Namespaces(outcome.records), &outcome.errors, args, &config)
}

pub async fn handle_kmm2_command(args: &GlobalArgs, config: DiagConfig, namespace: Option<String>) -> Result<()> {
    let gateway = KubeGateway::from_config(&config);
    let namespaces = kafka_namespaces(&gateway, namespace.as_deref()).await?;
    let gateway = &gateway;

    let outcome = per_namespace(namespaces, config.max_concurrency, |ns| async move {
        let mirror_makers = gateway
            .mirror_makers(&ns)
            .await
            .map_err(|e| gateway_error(&ns, "kafkamirrormaker2", e))?;
        Ok::<_, EntityError>(PerCluster::new(ns, mirror_makers))
    })
    .await;

    emit_report(&Report::MirrorMakers(outcome.records), &outcome.errors, args, &config)
}

pub async fn handle_ktopic_command(
    args: &GlobalArgs,
    config: DiagConfig,
    namespace: Option<String>,
    topics: Option<String>,
) -> Result<()> {
    let gateway = Arc::new(KubeGateway::from_config(&config));
    let namespaces = kafka_namespaces(&gateway, namespace.as_deref()).await?;
    let clusters = list_arg(args.cluster.as_deref());
    let shown = list_arg(topics.as_deref());
    let limit = config.max_concurrency;

    let found = {
        let gateway = &gateway;
        let clusters = &clusters;
        per_namespace(namespaces, limit, |ns| async move {
            gateway
                .cluster_targets(&ns, clusters)
                .await
                .map_err(|e| gateway_error(&ns, "pods", e))
        })
        .await
    };
    let targets: Vec<ClusterTarget> = found.records.into_iter().flatten().collect();
    let mut errors = found.errors;

    let dispatcher = Dispatcher::new(gateway, config).with_lenient_state(true);
    let gated = dispatcher.gate(targets).await;
    errors.extend(gated.errors);
    info!("Describing topics of {} cluster(s)", gated.records.len());

    let dispatcher = &dispatcher;
    let shown = &shown;
    let items: Vec<&ClusterTarget> = gated.records.iter().collect();
    let rounds = fan_out(items, limit, |target| async move {
        let mut described = dispatcher.describe_all_topics(target).await;
        sort_topics(&mut described.records);
        let summary = TopicSummary::from_records(&described.records);
        let topics = described
            .records
            .into_iter()
            .filter(|t| shown.is_empty() || shown.contains(&t.name))
            .collect();
        let kube_topics = KubeTopics {
            namespace: target.role.clone().unwrap_or_default(),
            cluster: target.name.clone(),
            summary,
            topics,
        };
        (kube_topics, described.errors)
    })
    .await;

    let mut records = Vec::new();
    for (record, round_errors) in rounds {
        records.push(record);
        errors.extend(round_errors);
    }

    emit_report(&Report::KubeTopics(records), &errors, args, dispatcher.config())
}

pub async fn handle_kgroup_command(
    args: &GlobalArgs,
    config: DiagConfig,
    namespace: Option<String>,
    group: Option<String>,
) -> Result<()> {
    let gateway = Arc::new(KubeGateway::from_config(&config));
    let namespaces = kafka_namespaces(&gateway, namespace.as_deref()).await?;
    let wanted = list_arg(group.as_deref());
    let detailed = !wanted.is_empty();
    let limit = config.max_concurrency;

    let found = {
        let gateway = &gateway;
        per_namespace(namespaces, limit, |ns| async move {
            gateway
                .namespace_target(&ns)
                .await
                .map_err(|e| gateway_error(&ns, "pods", e))
        })
        .await
    };
    let mut errors = found.errors;

    let dispatcher = Dispatcher::new(gateway, config).with_lenient_state(true);
    let gated = dispatcher.gate(found.records).await;
    errors.extend(gated.errors);

    let dispatcher = &dispatcher;
    let wanted = &wanted;
    let items: Vec<&ClusterTarget> = gated.records.iter().collect();
    let rounds = fan_out(items, limit, |target| async move {
        if detailed {
            let mut groups: Vec<GroupRecord> = wanted.iter().map(GroupRecord::named).collect();
            let errors = dispatcher.fill_groups(target, &mut groups, &GroupDetail::ALL).await;
            (PerCluster::new(&target.name, groups), errors)
        } else {
            let states = dispatcher.group_states(target).await;
            (PerCluster::new(&target.name, states.records), states.errors)
        }
    })
    .await;

    let mut clusters = Vec::new();
    for (round, round_errors) in rounds {
        clusters.push(round);
        errors.extend(round_errors);
    }

    let report = Report::Groups {
        clusters: merge_group_rounds(clusters),
        detailed,
    };
    emit_report(&report, &errors, args, dispatcher.config())
}
