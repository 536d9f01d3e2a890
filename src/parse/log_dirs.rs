use serde::Deserialize;

use crate::scan::types::{LogDirRecord, PartitionSize};

/// `kafka-log-dirs.sh --describe` prints two status lines, then the JSON document
pub const LOG_DIRS_PAYLOAD_LINE: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("log dirs output has no line {line} (got {found} lines)")]
    MissingPayload { line: usize, found: usize },

    #[error("malformed log dirs payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct LogDirsPayload {
    brokers: Vec<BrokerLogDirs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrokerLogDirs {
    broker: i32,
    log_dirs: Vec<LogDir>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogDir {
    log_dir: String,
    partitions: Vec<LogDirPartition>,
}

#[derive(Debug, Deserialize)]
struct LogDirPartition {
    partition: String,
    size: u64,
}

/// Decode the JSON document found on line [`LOG_DIRS_PAYLOAD_LINE`].
///
/// The line is located by position only. A missing line or malformed JSON fails the
/// whole response.
pub fn parse_log_dirs(raw: &str) -> Result<Vec<LogDirRecord>, ParseError> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let payload = lines
        .get(LOG_DIRS_PAYLOAD_LINE)
        .ok_or(ParseError::MissingPayload {
            line: LOG_DIRS_PAYLOAD_LINE,
            found: lines.len(),
        })?;

    let decoded: LogDirsPayload = serde_json::from_str(payload.trim())?;

    Ok(decoded
        .brokers
        .into_iter()
        .map(|b| LogDirRecord {
            broker: b.broker,
            log_dirs: b.log_dirs.iter().map(|d| d.log_dir.clone()).collect(),
            partitions: b
                .log_dirs
                .into_iter()
                .flat_map(|d| d.partitions)
                .map(|p| PartitionSize {
                    partition: p.partition,
                    size: p.size,
                })
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"Querying brokers for log directories information
Received log directory information from brokers 0,1
{"version":1,"brokers":[{"broker":0,"logDirs":[{"logDir":"/opt/kafkadata/d1","error":null,"partitions":[{"partition":"orders-0","size":1024,"offsetLag":0,"isFuture":false},{"partition":"orders-1","size":2048,"offsetLag":0,"isFuture":false}]}]},{"broker":1,"logDirs":[{"logDir":"/opt/kafkadata/d1","error":null,"partitions":[]},{"logDir":"/opt/kafkadata/d2","error":null,"partitions":[{"partition":"payments-0","size":10,"offsetLag":0,"isFuture":false}]}]}]}
"#;

    #[test]
    fn test_payload_on_third_line() {
        let records = parse_log_dirs(OUTPUT).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].broker, 0);
        assert_eq!(records[0].partitions.len(), 2);
        assert_eq!(records[0].partitions[1].size, 2048);

        // partitions of every log dir are flattened
        assert_eq!(records[1].log_dirs.len(), 2);
        assert_eq!(records[1].partitions[0].partition, "payments-0");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let raw = "line one\nline two\n{\"brokers\": [oops\n";
        assert!(matches!(parse_log_dirs(raw), Err(ParseError::Json(_))));
    }

    #[test]
    fn test_json_elsewhere_is_not_discovered() {
        let raw = "{\"version\":1,\"brokers\":[]}\nsecond\n";
        // line 2 exists but is empty, so it is not valid JSON
        assert!(matches!(parse_log_dirs(raw), Err(ParseError::Json(_))));
        assert!(matches!(
            parse_log_dirs("only one line"),
            Err(ParseError::MissingPayload { .. })
        ));
    }
}
