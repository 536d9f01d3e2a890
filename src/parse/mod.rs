//! Extractors turning raw admin-tool and exporter output into typed records.
//!
//! Every parser except [`log_dirs::parse_log_dirs`] is infallible: a line that does
//! not match is dropped. The log-dir JSON payload is the one hard error.

pub mod acls;
pub mod configs;
pub mod groups;
pub mod log_dirs;
pub mod metrics;
pub mod topics;

pub use acls::parse_acls;
pub use configs::parse_broker_config;
pub use groups::{
    parse_detail_lines, parse_group_state, parse_group_state_lenient, parse_group_state_rows,
};
pub use log_dirs::{parse_log_dirs, ParseError, LOG_DIRS_PAYLOAD_LINE};
pub use metrics::{parse_metrics, MetricKind, MetricQuery};
pub use topics::{parse_name_list, parse_topic_descriptions};

/// Admin tools print log4j warnings prefixed with `[`
pub(crate) fn is_tool_noise(line: &str) -> bool {
    line.trim_start().starts_with('[')
}
