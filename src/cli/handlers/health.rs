use anyhow::Result;
use tracing::info;

use super::Session;
use crate::cli::commands::{GlobalArgs, HealthChecks};
use crate::cli::utils::emit_report;
use crate::config::DiagConfig;
use crate::report::Report;
use crate::scan::types::HealthCheck;

pub async fn handle_health_command(args: &GlobalArgs, config: DiagConfig, checks: HealthChecks) -> Result<()> {
    let selected = selected_checks(&checks);
    let mut session = Session::open(args, config).await;
    info!("Running {} health check(s)", selected.len());

    let health = session.dispatcher.health(&session.targets, &selected).await;
    session.errors.extend(health.errors);

    let report = Report::Health(health.records);
    emit_report(&report, &session.errors, args, session.dispatcher.config())
}

/// Checks picked by the flags, every check when none (or `--all`) is given
pub fn selected_checks(checks: &HealthChecks) -> Vec<HealthCheck> {
    if checks.all || !checks.any() {
        return HealthCheck::ALL.to_vec();
    }

    [
        (checks.urp, HealthCheck::UnderReplicated),
        (checks.umisr, HealthCheck::UnderMinIsr),
        (checks.amisr, HealthCheck::AtMinIsr),
        (checks.uav, HealthCheck::Unavailable),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .map(|(_, check)| check)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flag_means_every_check() {
        assert_eq!(selected_checks(&HealthChecks::default()), HealthCheck::ALL.to_vec());
    }

    #[test]
    fn test_selected_flags_only() {
        let checks = HealthChecks {
            umisr: true,
            uav: true,
            ..Default::default()
        };
        assert_eq!(
            selected_checks(&checks),
            vec![HealthCheck::UnderMinIsr, HealthCheck::Unavailable]
        );
    }
}
