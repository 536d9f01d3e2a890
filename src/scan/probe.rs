use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use crate::scan::resolve::{parse_endpoint, ResolveError};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("no endpoint to probe")]
    NoEndpoints,

    #[error(transparent)]
    InvalidEndpoint(#[from] ResolveError),

    #[error("connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {endpoint} timed out after {timeout_ms} ms")]
    Timeout { endpoint: String, timeout_ms: u128 },
}

/// Try each endpoint in order and return the first that accepts a TCP connection.
///
/// No retry: when none answers, the error of the last attempt is returned.
pub async fn probe<S: AsRef<str>>(endpoints: &[S], timeout: Duration) -> Result<String, ProbeError> {
    let mut last_error = ProbeError::NoEndpoints;

    for endpoint in endpoints {
        let endpoint = endpoint.as_ref();
        let (host, port) = parse_endpoint(endpoint)?;

        debug!("Trying to connect to {}:{} in {} millis", host, port, timeout.as_millis());
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                debug!("Opened {}", endpoint);
                return Ok(endpoint.to_string());
            }
            Ok(Err(source)) => {
                last_error = ProbeError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                };
            }
            Err(_) => {
                last_error = ProbeError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: timeout.as_millis(),
                };
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A local port with nothing listening on it
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_probe_returns_first_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        let closed = format!("127.0.0.1:{}", closed_port().await);

        let reachable = probe(&[closed, open.clone()], Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(reachable, open);
    }

    #[tokio::test]
    async fn test_probe_reports_last_failure() {
        let first = format!("127.0.0.1:{}", closed_port().await);
        let last = format!("127.0.0.1:{}", closed_port().await);

        let err = probe(&[first, last.clone()], Duration::from_millis(500))
            .await
            .unwrap_err();
        match err {
            ProbeError::Connect { endpoint, .. } | ProbeError::Timeout { endpoint, .. } => {
                assert_eq!(endpoint, last)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_probe_rejects_malformed_endpoint() {
        let err = probe(&["no-port-here"], Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn test_probe_empty_list() {
        let empty: [&str; 0] = [];
        let err = probe(&empty, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ProbeError::NoEndpoints));
    }
}
