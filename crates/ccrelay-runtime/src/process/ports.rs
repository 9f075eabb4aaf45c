//! Port allocation utilities for the local proxy.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, TcpListener as StdTcpListener};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{RelayError, RelayResult};

/// Bind attempts before allocation gives up.
pub const ALLOCATION_ATTEMPTS: u32 = 5;

/// Fixed delay between failed bind attempts.
pub const ALLOCATION_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Check if a port is available by attempting to bind to it.
/// This method binds and immediately drops the listener, which releases the port.
pub fn is_port_available(port: u16) -> bool {
    StdTcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .and_then(|listener| listener.local_addr())
        .is_ok()
}

/// Obtain a free loopback port by binding port 0 and reading back the assignment.
///
/// The listener is released before returning, so the port can be taken by
/// someone else before the proxy binds it. That race shows up later as a
/// readiness failure, not here.
pub async fn allocate_port() -> RelayResult<u16> {
    allocate_port_with(|| async {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        Ok(listener.local_addr()?.port())
    })
    .await
}

async fn allocate_port_with<F, Fut>(mut bind: F) -> RelayResult<u16>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<u16>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match bind().await {
            Ok(port) => {
                debug!(port = %port, attempt = %attempt, "Allocated available port");
                return Ok(port);
            }
            Err(e) if attempt < ALLOCATION_ATTEMPTS => {
                debug!(attempt = %attempt, error = %e, "Port bind failed, retrying");
                sleep(ALLOCATION_RETRY_DELAY).await;
            }
            Err(source) => {
                return Err(RelayError::Allocation {
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}
