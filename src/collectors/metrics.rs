use std::time::Duration;
use tracing::debug;

use super::{CollectorError, CollectorResult};

/// Scrape a Prometheus exporter page
pub async fn fetch_metrics_page(
    client: &reqwest::Client,
    host: &str,
    port: u16,
    timeout: Duration,
) -> CollectorResult<String> {
    let url = format!("http://{}:{}/metrics", host, port);
    debug!("GET {} (timeout {} ms)", url, timeout.as_millis());

    let response = client.get(&url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CollectorError::HttpStatus {
            url,
            status: status.as_u16(),
        });
    }

    Ok(response.text().await?)
}
