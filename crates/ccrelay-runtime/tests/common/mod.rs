//! Fake proxy backend for ccrelay-runtime integration tests.
//!
//! Launching binds the requested loopback port and answers `GET /health`
//! in-process, so no Python runtime or network access is needed.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ccrelay_runtime::{LaunchSpec, ProxyBackend, ProxyProcess, ReadinessPolicy, RelayError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Short readiness budget so failure paths finish quickly.
pub const FAST_READINESS: ReadinessPolicy = ReadinessPolicy::new(Duration::from_millis(20), 10);

/// How the fake proxy answers health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// 200 when the master key is presented, 401 otherwise.
    Ok,
    /// Always 503.
    Unhealthy,
    /// Never binds the port.
    Silent,
}

/// Call counters shared between the backend and its processes.
#[derive(Debug, Default)]
pub struct Stats {
    pub installs: AtomicU32,
    pub launches: AtomicU32,
    pub terminates: AtomicU32,
    pub kills: AtomicU32,
}

impl Stats {
    pub fn get(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

pub struct FakeBackend {
    health: Health,
    install_fails: bool,
    ignore_terminate: bool,
    pub stats: Arc<Stats>,
    /// Config file contents and launch spec seen at launch time.
    pub launched: Mutex<Option<(LaunchSpec, String)>>,
}

impl FakeBackend {
    pub fn new(health: Health) -> Self {
        Self {
            health,
            install_fails: false,
            ignore_terminate: false,
            stats: Arc::new(Stats::default()),
            launched: Mutex::new(None),
        }
    }

    pub fn healthy() -> Self {
        Self::new(Health::Ok)
    }

    pub fn failing_install(mut self) -> Self {
        self.install_fails = true;
        self
    }

    /// Processes ignore SIGTERM and only die on kill.
    pub fn stubborn(mut self) -> Self {
        self.ignore_terminate = true;
        self
    }

    pub fn launched(&self) -> Option<(LaunchSpec, String)> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProxyBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn ensure_installed(&self) -> Result<(), RelayError> {
        self.stats.installs.fetch_add(1, Ordering::SeqCst);
        if self.install_fails {
            return Err(RelayError::DependencyInstall {
                runtime: "fake".to_string(),
                reason: "installer exited with exit status: 1".to_string(),
            });
        }
        Ok(())
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ProxyProcess>, RelayError> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        let config = std::fs::read_to_string(&spec.config_path).unwrap();
        *self.launched.lock().unwrap() = Some((spec.clone(), config));

        let server = match self.health {
            Health::Silent => None,
            health => {
                let listener = std::net::TcpListener::bind(("127.0.0.1", spec.port)).unwrap();
                listener.set_nonblocking(true).unwrap();
                let listener = TcpListener::from_std(listener).unwrap();
                Some(tokio::spawn(serve_health(listener, health)))
            }
        };

        let (exited, _) = watch::channel(false);
        Ok(Box::new(FakeProcess {
            server,
            exited,
            ignore_terminate: self.ignore_terminate,
            stats: Arc::clone(&self.stats),
        }))
    }
}

async fn serve_health(listener: TcpListener, health: Health) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            continue;
        };
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        let request = String::from_utf8_lossy(&buf[..n]).to_ascii_lowercase();

        let status = if !request.starts_with("get /health ") {
            "404 Not Found"
        } else if health == Health::Unhealthy {
            "503 Service Unavailable"
        } else if request.contains("authorization: bearer sk-ccrelay-") {
            "200 OK"
        } else {
            "401 Unauthorized"
        };
        let response = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let _ = stream.write_all(response.as_bytes()).await;
    }
}

struct FakeProcess {
    server: Option<JoinHandle<()>>,
    exited: watch::Sender<bool>,
    ignore_terminate: bool,
    stats: Arc<Stats>,
}

impl FakeProcess {
    fn exit(&self) {
        if let Some(server) = &self.server {
            server.abort();
        }
        self.exited.send_replace(true);
    }
}

#[async_trait]
impl ProxyProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn terminate(&self) -> io::Result<()> {
        self.stats.terminates.fetch_add(1, Ordering::SeqCst);
        if !self.ignore_terminate {
            self.exit();
        }
        Ok(())
    }

    fn kill(&self) -> io::Result<()> {
        self.stats.kills.fetch_add(1, Ordering::SeqCst);
        self.exit();
        Ok(())
    }

    async fn wait_exit(&self) {
        let mut exited = self.exited.subscribe();
        let _ = exited.wait_for(|done| *done).await;
    }
}
