//! TCP connect based reachability detection
//!
//! Feeds a [`HostSignal`] by periodically trying to open a TCP connection to
//! a list of well-known targets. Any successful connect counts as reachable.
//! Checks are skipped while nobody listens to the signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ReachabilityConfig;
use crate::signal::HostSignal;

#[derive(Debug)]
pub struct TcpReachabilityWatcher {
    targets: Vec<String>,
    check_interval: Duration,
    connect_timeout: Duration,
    signal: Arc<HostSignal>,
}

impl TcpReachabilityWatcher {
    pub fn new(
        targets: Vec<String>,
        check_interval: Duration,
        connect_timeout: Duration,
        signal: Arc<HostSignal>,
    ) -> Self {
        Self {
            targets,
            check_interval,
            connect_timeout,
            signal,
        }
    }

    /// Build a watcher from configuration; `None` when reachability is disabled
    pub fn from_config(config: &ReachabilityConfig, signal: Arc<HostSignal>) -> Option<Self> {
        match config {
            ReachabilityConfig::TcpConnect {
                targets,
                check_interval_seconds,
                connect_timeout_ms,
            } => Some(Self::new(
                targets.clone(),
                Duration::from_secs(*check_interval_seconds),
                Duration::from_millis(*connect_timeout_ms),
                signal,
            )),
            ReachabilityConfig::Disabled => None,
        }
    }

    /// Try each target in order until one accepts a connection
    pub async fn check(&self) -> bool {
        for target in &self.targets {
            match time::timeout(self.connect_timeout, TcpStream::connect(target.as_str())).await {
                Ok(Ok(_)) => {
                    debug!("Reachability check: {} accepted", target);
                    return true;
                }
                Ok(Err(e)) => debug!("Reachability check: {} failed: {}", target, e),
                Err(_) => debug!(
                    "Reachability check: {} timed out after {:?}",
                    target, self.connect_timeout
                ),
            }
        }
        false
    }

    /// Check periodically until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => {
                    debug!("Reachability watcher cancelled");
                    break;
                }
            }

            if self.signal.listener_count() == 0 {
                continue;
            }

            let reachable = tokio::select! {
                reachable = self.check() => reachable,
                _ = cancel.cancelled() => break,
            };

            self.signal.set_reachable(reachable);
        }
    }
}
