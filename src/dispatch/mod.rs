//! Concurrent fan-out of diagnostic queries.
//!
//! Every operation builds a worklist, runs one unit of work per item through
//! [`fan_out`] and returns once all of them completed. Each unit owns exactly one
//! pre-allocated result slot, so no record is ever written by two tasks. Failures
//! are collected as [`EntityError`]s next to the records instead of aborting the run.
//!
//! Rounds nest (clusters, then topics of a cluster), so the `max_concurrency` cap is
//! held by a semaphore shared by every gateway call of a [`Dispatcher`].

pub mod errors;

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, error, info, warn};

use crate::collectors::{AdminQuery, CollectorError, CollectorResult, GroupDetail, QueryGateway};
use crate::config::DiagConfig;
use crate::parse::metrics::{kafka_metric_queries, node_metric_queries};
use crate::parse::{
    parse_acls, parse_broker_config, parse_detail_lines, parse_group_state, parse_group_state_lenient,
    parse_group_state_rows, parse_log_dirs, parse_metrics, parse_name_list, parse_topic_descriptions,
    MetricQuery,
};
use crate::scan::resolve::parse_endpoint;
use crate::scan::types::{
    AclRecord, BrokerMetrics, ClusterDiagnostics, ClusterHealth, ClusterTarget, ConfigEntry, GroupRecord,
    HealthCheck, LogDirRecord, PerCluster, TopicRecord,
};

pub use errors::{EntityError, ErrorKind, Outcome};

/// Run `task` for every item, at most `limit` at a time.
///
/// Results come back in input order whatever the completion order: each unit is
/// tagged with the index of its slot. Returns after every unit finished.
pub async fn fan_out<I, T, F, Fut>(items: Vec<I>, limit: usize, task: F) -> Vec<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    let mut slots: Vec<Option<T>> = items.iter().map(|_| None).collect();

    let mut completed = stream::iter(items.into_iter().enumerate())
        .map(|(slot, item)| {
            let unit = task(item);
            async move { (slot, unit.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((slot, value)) = completed.next().await {
        slots[slot] = Some(value);
    }

    slots.into_iter().flatten().collect()
}

/// Value produced by one group sub-query, written to its record after the join
enum GroupField {
    State(Option<String>),
    Members(Vec<String>),
    Describe(Vec<String>),
}

pub struct Dispatcher<G: QueryGateway> {
    gateway: Arc<G>,
    config: DiagConfig,
    lenient_state: bool,
    /// One permit per gateway call in flight
    concurrency_limiter: Semaphore,
}

impl<G: QueryGateway> Dispatcher<G> {
    pub fn new(gateway: Arc<G>, config: DiagConfig) -> Self {
        let permits = config.max_concurrency.max(1);
        Self {
            gateway,
            config,
            lenient_state: false,
            concurrency_limiter: Semaphore::new(permits),
        }
    }

    /// Locate group state rows by content instead of position (container output
    /// carries log lines before the table)
    pub fn with_lenient_state(mut self, lenient: bool) -> Self {
        self.lenient_state = lenient;
        self
    }

    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    fn limit(&self) -> usize {
        self.config.max_concurrency
    }

    async fn permit(&self) -> CollectorResult<SemaphorePermit<'_>> {
        self.concurrency_limiter
            .acquire()
            .await
            .map_err(|e| CollectorError::ConfigurationError(e.to_string()))
    }

    async fn preflight(&self, target: &ClusterTarget) -> CollectorResult<()> {
        let _permit = self.permit().await?;
        self.gateway.preflight(target).await
    }

    async fn fetch_metrics(&self, host: &str, port: u16, timeout: Duration) -> CollectorResult<String> {
        let _permit = self.permit().await?;
        self.gateway.fetch_metrics(host, port, timeout).await
    }

    async fn query(&self, target: &ClusterTarget, entity: &str, query: AdminQuery) -> Result<String, EntityError> {
        debug!("{} -> {} {:?}", self.gateway.name(), target.name, query);
        let response = match self.permit().await {
            Ok(_permit) => self.gateway.run_admin_query(target, &query).await,
            Err(e) => Err(e),
        };
        response.map_err(|e| {
            let err = EntityError::new(&target.name, entity, ErrorKind::Gateway, e);
            error!("{}", err);
            err
        })
    }

    /// Preflight every cluster; unreachable ones are dropped with a connectivity error
    pub async fn gate(&self, targets: Vec<ClusterTarget>) -> Outcome<Vec<ClusterTarget>> {
        let results = fan_out(targets, self.limit(), |target| async move {
            match self.preflight(&target).await {
                Ok(()) => Ok(target),
                Err(e) => {
                    let err = EntityError::new(&target.name, "preflight", ErrorKind::Connectivity, e);
                    error!("{}", err);
                    Err(err)
                }
            }
        })
        .await;

        let outcome = Outcome::from_results(results);
        info!(
            "{} cluster(s) reachable, {} unreachable",
            outcome.records.len(),
            outcome.errors.len()
        );
        outcome
    }

    pub async fn list_topics(&self, targets: &[ClusterTarget]) -> Outcome<Vec<PerCluster<Vec<String>>>> {
        let items: Vec<&ClusterTarget> = targets.iter().collect();
        let results = fan_out(items, self.limit(), |target| async move {
            let raw = self.query(target, "topics", AdminQuery::TopicList).await?;
            Ok::<_, EntityError>(PerCluster::new(&target.name, parse_name_list(&raw)))
        })
        .await;
        Outcome::from_results(results)
    }

    /// One describe query per topic
    pub async fn describe_topics(&self, target: &ClusterTarget, topics: &[String]) -> Outcome<Vec<TopicRecord>> {
        let items: Vec<&String> = topics.iter().collect();
        let results = fan_out(items, self.limit(), |topic| async move {
            let raw = self
                .query(
                    target,
                    topic,
                    AdminQuery::TopicDescribe {
                        topic: Some(topic.clone()),
                    },
                )
                .await?;

            let mut records = parse_topic_descriptions(&raw);
            let position = records.iter().position(|r| &r.name == topic).unwrap_or(0);
            if records.is_empty() {
                warn!("{}: no description returned for topic {}", target.name, topic);
                return Ok(None);
            }
            Ok::<_, EntityError>(Some(records.swap_remove(position)))
        })
        .await;

        Outcome::from_results(results).map(|records| records.into_iter().flatten().collect())
    }

    pub async fn describe_all_topics(&self, target: &ClusterTarget) -> Outcome<Vec<TopicRecord>> {
        match self.query(target, "topics", AdminQuery::TopicDescribe { topic: None }).await {
            Ok(raw) => Outcome::new(parse_topic_descriptions(&raw), Vec::new()),
            Err(e) => Outcome::new(Vec::new(), vec![e]),
        }
    }

    /// One query per (cluster, check). A cluster with any failed check is left out.
    pub async fn health(&self, targets: &[ClusterTarget], checks: &[HealthCheck]) -> Outcome<Vec<ClusterHealth>> {
        let items: Vec<(usize, HealthCheck)> = (0..targets.len())
            .flat_map(|i| checks.iter().map(move |check| (i, *check)))
            .collect();

        let results = fan_out(items, self.limit(), |(i, check)| {
            let target = &targets[i];
            async move {
                let result = self.query(target, check.label(), AdminQuery::TopicHealth(check)).await;
                (i, check, result)
            }
        })
        .await;

        let mut reports: Vec<ClusterHealth> = targets
            .iter()
            .map(|t| ClusterHealth {
                cluster: t.name.clone(),
                ..Default::default()
            })
            .collect();
        let mut failed = vec![false; targets.len()];
        let mut errors = Vec::new();

        for (i, check, result) in results {
            match result {
                Ok(raw) => {
                    let lines = raw
                        .lines()
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| l.trim_end().to_string())
                        .collect();
                    reports[i].checks.insert(check, lines);
                }
                Err(e) => {
                    failed[i] = true;
                    errors.push(e);
                }
            }
        }

        let records = reports
            .into_iter()
            .zip(failed)
            .filter(|(_, failed)| !failed)
            .map(|(report, _)| report)
            .collect();
        Outcome::new(records, errors)
    }

    /// Group names per cluster, as empty records
    pub async fn list_groups(&self, targets: &[ClusterTarget]) -> Outcome<Vec<PerCluster<Vec<GroupRecord>>>> {
        let items: Vec<&ClusterTarget> = targets.iter().collect();
        let results = fan_out(items, self.limit(), |target| async move {
            let raw = self.query(target, "groups", AdminQuery::GroupList).await?;
            let groups: Vec<GroupRecord> = parse_name_list(&raw).into_iter().map(GroupRecord::named).collect();
            Ok::<_, EntityError>(PerCluster::new(&target.name, groups))
        })
        .await;
        Outcome::from_results(results)
    }

    /// Fill the requested details of every group, one task per (group, detail).
    ///
    /// Each task result lands in the field of the record at its index.
    pub async fn fill_groups(
        &self,
        target: &ClusterTarget,
        groups: &mut [GroupRecord],
        details: &[GroupDetail],
    ) -> Vec<EntityError> {
        let names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
        let items: Vec<(usize, GroupDetail)> = (0..names.len())
            .flat_map(|i| details.iter().map(move |detail| (i, *detail)))
            .collect();

        let results = fan_out(items, self.limit(), |(i, detail)| {
            let group = &names[i];
            async move {
                let query = AdminQuery::GroupDescribe {
                    group: group.clone(),
                    detail,
                };
                let field = self.query(target, group, query).await.map(|raw| match detail {
                    GroupDetail::State => {
                        let state = if self.lenient_state {
                            parse_group_state_lenient(&raw)
                        } else {
                            parse_group_state(&raw)
                        };
                        if state.is_none() {
                            warn!("{}: no state row for group {}", target.name, group);
                        }
                        GroupField::State(state)
                    }
                    GroupDetail::Members => GroupField::Members(parse_detail_lines(&raw)),
                    GroupDetail::Offsets => GroupField::Describe(parse_detail_lines(&raw)),
                });
                (i, field)
            }
        })
        .await;

        let mut errors = Vec::new();
        for (i, field) in results {
            match field {
                Ok(GroupField::State(state)) => groups[i].state = state.unwrap_or_default(),
                Ok(GroupField::Members(lines)) => groups[i].members = lines,
                Ok(GroupField::Describe(lines)) => groups[i].describe = lines,
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    /// State rows of every group of a cluster, from a single query
    pub async fn group_states(&self, target: &ClusterTarget) -> Outcome<Vec<GroupRecord>> {
        match self.query(target, "groups", AdminQuery::GroupStateAll).await {
            Ok(raw) => Outcome::new(parse_group_state_rows(&raw), Vec::new()),
            Err(e) => Outcome::new(Vec::new(), vec![e]),
        }
    }

    /// ACLs of the given topics, or of the whole cluster when none is given
    pub async fn acls(&self, target: &ClusterTarget, topics: &[String]) -> Outcome<Vec<AclRecord>> {
        let items: Vec<Option<&String>> = if topics.is_empty() {
            vec![None]
        } else {
            topics.iter().map(Some).collect()
        };

        let results = fan_out(items, self.limit(), |topic| async move {
            let entity = topic.map(String::as_str).unwrap_or("acls");
            let query = AdminQuery::AclList { topic: topic.cloned() };
            let raw = self.query(target, entity, query).await?;
            Ok::<_, EntityError>(parse_acls(&raw))
        })
        .await;
        Outcome::flatten_results(results)
    }

    pub async fn broker_config(&self, target: &ClusterTarget, broker: i32) -> Outcome<Vec<ConfigEntry>> {
        let entity = format!("broker {}", broker);
        match self.query(target, &entity, AdminQuery::BrokerConfig { broker }).await {
            Ok(raw) => Outcome::new(parse_broker_config(&raw), Vec::new()),
            Err(e) => Outcome::new(Vec::new(), vec![e]),
        }
    }

    /// Log dirs of the whole cluster in one query, or one query per listed broker
    pub async fn log_dirs(&self, target: &ClusterTarget, brokers: Option<&[i32]>) -> Outcome<Vec<LogDirRecord>> {
        let items: Vec<Option<i32>> = match brokers {
            Some(ids) if !ids.is_empty() => ids.iter().copied().map(Some).collect(),
            _ => vec![None],
        };

        let results = fan_out(items, self.limit(), |broker| async move {
            let entity = broker
                .map(|id| format!("log-dirs broker {}", id))
                .unwrap_or_else(|| "log-dirs".to_string());
            let query = AdminQuery::LogDirs {
                brokers: broker.map(|id| vec![id]),
            };
            let raw = self.query(target, &entity, query).await?;
            parse_log_dirs(&raw).map_err(|e| {
                let err = EntityError::new(&target.name, &entity, ErrorKind::Parse, e);
                error!("{}", err);
                err
            })
        })
        .await;
        Outcome::flatten_results(results)
    }

    /// Scrape the node and Kafka exporters of every broker of the cluster
    pub async fn broker_metrics(
        &self,
        target: &ClusterTarget,
        node_queries: &[MetricQuery],
        kafka_queries: &[MetricQuery],
    ) -> Outcome<Vec<BrokerMetrics>> {
        let timeout = self.config.http_timeout();
        let node_port = self.config.node_metrics_port;
        let kafka_port = self.config.kafka_metrics_port;

        let items: Vec<&String> = target.endpoints.iter().collect();
        let results = fan_out(items, self.limit(), |endpoint| async move {
            let host = parse_endpoint(endpoint).map(|(h, _)| h).unwrap_or(endpoint.as_str());
            let (node, kafka) = futures::join!(
                self.fetch_metrics(host, node_port, timeout),
                self.fetch_metrics(host, kafka_port, timeout)
            );

            let mut metrics = BrokerMetrics {
                endpoint: endpoint.clone(),
                ..Default::default()
            };
            let mut errors = Vec::new();
            let pages = [
                (true, node_port, node, node_queries),
                (false, kafka_port, kafka, kafka_queries),
            ];
            for (is_node, port, page, queries) in pages {
                match page {
                    Ok(raw) => {
                        let samples = parse_metrics(&raw, queries);
                        if is_node {
                            metrics.node = samples;
                        } else {
                            metrics.kafka = samples;
                        }
                    }
                    Err(e) => {
                        let err = EntityError::new(&target.name, &format!("{}:{}", host, port), ErrorKind::Gateway, e);
                        error!("{}", err);
                        errors.push(err);
                    }
                }
            }
            (metrics, errors)
        })
        .await;

        let (records, errors): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        Outcome::new(records, errors.into_iter().flatten().collect())
    }

    /// Topic list, log dirs and broker metrics of every cluster
    pub async fn cluster_info(&self, targets: &[ClusterTarget]) -> Outcome<Vec<ClusterDiagnostics>> {
        let node_queries = node_metric_queries(&self.config.data_mount);
        let kafka_queries = kafka_metric_queries();
        let (node_queries, kafka_queries) = (&node_queries, &kafka_queries);

        let items: Vec<&ClusterTarget> = targets.iter().collect();
        let results = fan_out(items, self.limit(), |target| async move {
            let (topics, log_dirs, brokers) = futures::join!(
                self.query(target, "topics", AdminQuery::TopicList),
                self.log_dirs(target, None),
                self.broker_metrics(target, node_queries, kafka_queries)
            );

            let mut errors = Vec::new();
            let topics = match topics {
                Ok(raw) => parse_name_list(&raw),
                Err(e) => {
                    errors.push(e);
                    Vec::new()
                }
            };
            errors.extend(log_dirs.errors);
            errors.extend(brokers.errors);

            let diagnostics = ClusterDiagnostics {
                cluster: target.name.clone(),
                topics,
                log_dirs: log_dirs.records,
                brokers: brokers.records,
            };
            (diagnostics, errors)
        })
        .await;

        let (records, errors): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        Outcome::new(records, errors.into_iter().flatten().collect())
    }
}
