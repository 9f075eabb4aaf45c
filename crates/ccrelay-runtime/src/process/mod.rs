//! OS-level process helpers: port allocation, readiness probing and signals.

pub mod health;
pub mod ports;
#[cfg(unix)]
pub mod shutdown;

pub use health::{
    ReadinessPolicy, check_http_health, health_client, health_url, wait_for_http_health,
};
pub use ports::{ALLOCATION_ATTEMPTS, allocate_port, is_port_available};
#[cfg(unix)]
pub use shutdown::{interrupt_pid, kill_pid, terminate_pid};
