use tracing::warn;

use crate::scan::types::ConfigEntry;

const SYNONYMS_MARKER: &str = "synonyms=";

/// Parse `kafka-configs.sh --describe --broker N --all` output.
///
/// Each entry line reads `key=value sensitive=<bool> synonyms={...}` (older tools
/// print `is_sensitive=`). The header lines and anything without three space-separated
/// segments are skipped.
pub fn parse_broker_config(raw: &str) -> Vec<ConfigEntry> {
    raw.lines().filter_map(parse_config_line).collect()
}

fn parse_config_line(line: &str) -> Option<ConfigEntry> {
    let line = line.trim();
    let segments: Vec<&str> = line.splitn(3, ' ').collect();
    if segments.len() != 3 {
        return None;
    }

    let (key, value) = segments[0].split_once('=')?;
    if key.is_empty() {
        return None;
    }

    let (_, flag) = segments[1].split_once('=')?;
    let sensitive = flag.parse::<bool>().unwrap_or_else(|_| {
        warn!("Bad value for sensitivity flag in '{}'", segments[1]);
        false
    });

    let synonyms = line
        .split_once(SYNONYMS_MARKER)
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default();

    Some(ConfigEntry {
        key: key.to_string(),
        value: value.to_string(),
        sensitive,
        synonyms,
    })
}
