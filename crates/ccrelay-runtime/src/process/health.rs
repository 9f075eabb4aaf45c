//! Readiness probing for the local proxy.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::{RelayError, RelayResult};

/// How often and how many times to poll the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Delay between consecutive polls.
    pub interval: Duration,
    /// Polls before giving up.
    pub max_attempts: u32,
}

impl ReadinessPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on the time spent polling, ignoring request latency.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), 30)
    }
}

/// URL of the proxy's health endpoint on a loopback port.
pub fn health_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/health")
}

/// HTTP client used for readiness polling.
///
/// The per-request timeout keeps a hung connection from stalling the
/// attempt ceiling.
pub fn health_client(policy: ReadinessPolicy) -> RelayResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(policy.interval.max(Duration::from_millis(500)))
        .build()
        .map_err(RelayError::HealthClient)
}

/// Single health check. Only `200 OK` counts as healthy.
pub async fn check_http_health(
    client: &reqwest::Client,
    port: u16,
    bearer: Option<&str>,
) -> bool {
    let mut request = client.get(health_url(port));
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    match request.send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => true,
        Ok(response) => {
            debug!(
                port = %port,
                status = %response.status(),
                "Health check returned non-200, retrying"
            );
            false
        }
        Err(e) => {
            debug!(port = %port, error = %e, "Health check failed, retrying");
            false
        }
    }
}

/// Wait for the health endpoint to answer `200 OK`.
///
/// Polls every `policy.interval` up to `policy.max_attempts` times. Network
/// errors are swallowed; exhausting the attempts fails with
/// [`RelayError::ReadinessTimeout`].
pub async fn wait_for_http_health(
    port: u16,
    bearer: Option<&str>,
    policy: ReadinessPolicy,
) -> RelayResult<()> {
    info!("Waiting for proxy to be ready at {}", health_url(port));
    let client = health_client(policy)?;

    for attempt in 1..=policy.max_attempts {
        sleep(policy.interval).await;

        if check_http_health(&client, port, bearer).await {
            info!(port = %port, attempt = %attempt, "Proxy is ready");
            return Ok(());
        }
    }

    Err(RelayError::ReadinessTimeout {
        port,
        attempts: policy.max_attempts,
    })
}
