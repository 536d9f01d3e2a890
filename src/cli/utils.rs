use anyhow::{Context, Result};
use std::io;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::commands::{GlobalArgs, ReportFormat};
use crate::config::DiagConfig;
use crate::dispatch::EntityError;
use crate::report::{JsonReporter, Report, TerminalReporter};
use crate::scan::resolve::{parse_endpoint, split_list, EndpointResolver, ResolveError};
use crate::scan::types::ClusterTarget;

/// Logs go to stderr so reports on stdout stay clean
pub fn init_logging(verbose: bool, log_format: &str) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let fmt_layer = if log_format == "json" {
        fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    // A subscriber may already be installed (tests); keep it
    let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
}

pub fn print_about() {
    println!("kstat v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();
    println!("For more information, visit: {}", env!("CARGO_PKG_REPOSITORY"));
}

/// Defaults, config file and environment, then command-line overrides
pub fn load_config(args: &GlobalArgs) -> Result<DiagConfig> {
    let mut config = DiagConfig::load(args.config_file.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, args);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn apply_overrides(config: &mut DiagConfig, args: &GlobalArgs) {
    if let Some(timeout) = args.timeout {
        config.probe_timeout_ms = timeout;
    }
    if let Some(timeout) = args.http_timeout {
        config.http_timeout_ms = timeout;
    }
    if let Some(timeout) = args.admin_timeout {
        config.admin_timeout_secs = Some(timeout);
    }
    if let Some(limit) = args.max_concurrency {
        config.max_concurrency = limit;
    }
    if let Some(bastion) = &args.bastion {
        config.bastion = Some(bastion.clone());
    }
    if args.short {
        config.short = true;
    }
}

/// Targets named on the command line.
///
/// `--cluster` wins over `--broker`. Identifiers that do not resolve come back as
/// resolution errors next to the targets that did.
pub fn build_targets(args: &GlobalArgs, config: &DiagConfig) -> (Vec<ClusterTarget>, Vec<EntityError>) {
    let resolver = EndpointResolver::from_config(config);
    let mut targets = Vec::new();
    let mut errors = Vec::new();

    if let Some(clusters) = args.cluster.as_deref().filter(|c| !c.trim().is_empty()) {
        for identifier in split_list(clusters) {
            match resolver.target(&identifier) {
                Ok(target) => targets.push(target),
                Err(e) => errors.push(EntityError::resolution(&identifier, e)),
            }
        }
    } else if let Some(brokers) = args.broker.as_deref() {
        match resolver.target_from_bootstrap(brokers) {
            Ok(target) => targets.push(target),
            Err(e) => {
                let endpoints = split_list(brokers);
                let well_formed = endpoints.iter().all(|e| parse_endpoint(e).is_ok());
                match endpoints.first() {
                    // Bootstrap outside the naming scheme: the first endpoint names it
                    Some(first) if well_formed => {
                        warn!("{}; using {} as cluster name", e, first);
                        targets.push(ClusterTarget::new(first.clone(), endpoints.clone()));
                    }
                    _ => errors.push(EntityError::resolution(brokers, e)),
                }
            }
        }
    } else {
        errors.push(EntityError::resolution("", ResolveError::EmptyIdentifier));
    }

    for err in &errors {
        error!("{}", err);
    }
    (targets, errors)
}

/// Comma-separated flag value as a list, empty when unset
pub fn list_arg(value: Option<&str>) -> Vec<String> {
    value.map(split_list).unwrap_or_default()
}

/// Render on stdout in the selected format
pub fn emit_report(report: &Report, errors: &[EntityError], args: &GlobalArgs, config: &DiagConfig) -> Result<()> {
    match args.format {
        ReportFormat::Terminal => {
            TerminalReporter::new()
                .with_short(config.short)
                .with_show_null(config.show_null)
                .print(report);
            if !errors.is_empty() {
                warn!("{} query(ies) failed, see the errors above", errors.len());
            }
        }
        ReportFormat::Json => {
            let path = args.output.clone().unwrap_or_else(|| "-".into());
            JsonReporter::new()
                .save_report(report, errors, &path)
                .context("Failed to write JSON report")?;
        }
    }
    Ok(())
}
