use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::DiagConfig;
use crate::scan::types::ClusterTarget;

/// Cluster identifiers look like `bku10`: b, k|z, an environment letter, two digits
static CLUSTER_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^b[kz][a-z][0-9]{2}$").unwrap_or_else(|_| unreachable!()));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("cluster name is not defined")]
    EmptyIdentifier,

    #[error("bad format for cluster name [{0}] (e.g. bku10)")]
    InvalidIdentifier(String),

    #[error("bad format for broker [{0}]: should be of the form fqdn:port (e.g. bkuv1000.os.amadeus.net:9092)")]
    InvalidEndpoint(String),
}

/// Maps cluster identifiers to broker endpoints and back
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    domain: String,
    port: u16,
    brokers: u8,
    endpoint_regex: Regex,
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::from_config(&DiagConfig::default())
    }
}

impl EndpointResolver {
    pub fn new(domain: &str, port: u16, brokers: u8) -> Self {
        let pattern = format!(
            r"^(b[kz][a-z])v([0-9]{{2}})[0-9]{{2}}{}:[0-9]+$",
            regex::escape(domain)
        );
        Self {
            domain: domain.to_string(),
            port,
            brokers,
            endpoint_regex: Regex::new(&pattern).unwrap_or_else(|_| unreachable!()),
        }
    }

    pub fn from_config(config: &DiagConfig) -> Self {
        Self::new(&config.domain, config.broker_port, config.brokers_per_cluster)
    }

    /// `bku10` => `bkuv1000<domain>:<port>`, `bkuv1001<domain>:<port>`, ...
    pub fn resolve(&self, identifier: &str) -> Result<Vec<String>, ResolveError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ResolveError::EmptyIdentifier);
        }
        if !CLUSTER_ID_REGEX.is_match(identifier) {
            return Err(ResolveError::InvalidIdentifier(identifier.to_string()));
        }

        debug!("Computing {} brokers for cluster {} on port {}", self.brokers, identifier, self.port);
        let stem = format!("{}v{}", &identifier[..3], &identifier[3..]);
        Ok((0..self.brokers)
            .map(|i| format!("{}{:02}{}:{}", stem, i, self.domain, self.port))
            .collect())
    }

    pub fn target(&self, identifier: &str) -> Result<ClusterTarget, ResolveError> {
        let endpoints = self.resolve(identifier)?;
        Ok(ClusterTarget::new(identifier.trim(), endpoints))
    }

    /// Recover the cluster identifier from the first endpoint of a list
    pub fn identifier_of<S: AsRef<str>>(&self, endpoints: &[S]) -> Result<String, ResolveError> {
        let first = endpoints
            .first()
            .map(|e| e.as_ref().trim())
            .ok_or_else(|| ResolveError::InvalidEndpoint(String::new()))?;

        self.endpoint_regex
            .captures(first)
            .map(|caps| format!("{}{}", &caps[1], &caps[2]))
            .ok_or_else(|| ResolveError::InvalidEndpoint(first.to_string()))
    }

    /// Build a target from a comma-separated bootstrap string given on the command line
    pub fn target_from_bootstrap(&self, bootstrap: &str) -> Result<ClusterTarget, ResolveError> {
        let endpoints = split_list(bootstrap);
        for endpoint in &endpoints {
            parse_endpoint(endpoint)?;
        }
        let name = self.identifier_of(&endpoints)?;
        Ok(ClusterTarget::new(name, endpoints))
    }
}

/// Split a comma-separated flag value, trimming and dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `host:port`
pub fn parse_endpoint(endpoint: &str) -> Result<(&str, u16), ResolveError> {
    let invalid = || ResolveError::InvalidEndpoint(endpoint.to_string());
    let mut parts = endpoint.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(port), None) if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            Ok((host, port))
        }
        _ => Err(invalid()),
    }
}
