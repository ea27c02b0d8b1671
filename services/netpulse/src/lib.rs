//! Netpulse - connectivity monitor and status banner
//!
//! Watches network reachability, probes link quality, and decides whether
//! the connection status banner is hidden, warns about being offline, or
//! notes a slow connection.

pub mod banner;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod io;
pub mod monitor;
pub mod probe;
pub mod reachability;
pub mod signal;
pub mod state;

pub use banner::{render, Banner};
pub use config::{load_config, Config};
pub use error::{NetpulseError, Result};
pub use monitor::{ConnectivityMonitor, MonitorSettings, Subscription};
pub use state::{ConnectionSpeed, ConnectivityState};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::io::{HttpClient, ReqwestHttpClient};
use crate::reachability::TcpReachabilityWatcher;
use crate::signal::{HostSignal, ReachabilitySignal, UnavailableSignal};
use crate::state::HistoryHandle;

/// Run the netpulse service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let cancel = CancellationToken::new();

    // Build the reachability signal
    let host_signal = Arc::new(HostSignal::new());
    let watcher =
        TcpReachabilityWatcher::from_config(&config.reachability, Arc::clone(&host_signal));
    let signal: Arc<dyn ReachabilitySignal> = if watcher.is_some() {
        host_signal
    } else {
        tracing::info!("Reachability detection disabled");
        Arc::new(UnavailableSignal)
    };

    // Build the monitor
    let probe = probe::from_config(&config.probe, http, Arc::clone(&signal));
    let monitor = ConnectivityMonitor::new(signal, probe, MonitorSettings::from(&config));

    let (initial, subscription) = monitor.subscribe();
    let history = state::new_history_handle(initial, config.status_server.history_size);
    tracing::info!(
        "Initial connectivity: {} (banner: {})",
        initial,
        banner::render(&initial)
    );

    // Start reachability checks once the monitor listens
    if let Some(watcher) = watcher {
        tokio::spawn(watcher.run(cancel.clone()));
    }

    let recorder = tokio::spawn(record_transitions(
        subscription,
        Arc::clone(&history),
        cancel.clone(),
    ));

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    // Start status server if enabled
    if config.status_server.enabled {
        let port = config.status_server.port;
        let router = dashboard::build_router(monitor.clone(), Arc::clone(&history));
        let cancel_for_server = cancel.clone();

        tokio::spawn(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            tracing::info!("Status server listening on http://{}", addr);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(
                        "Failed to bind status server to port {}: {}. Continuing without it.",
                        port,
                        e
                    );
                    return;
                }
            };

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_server.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Status server stopped");
        });
    }

    tracing::info!("Netpulse started");

    cancel.cancelled().await;

    monitor.dispose();
    let _ = recorder.await;
    tracing::info!("Netpulse stopped");

    Ok(())
}

/// Observer that logs banner changes and records them in the history
pub async fn record_transitions(
    mut subscription: Subscription,
    history: HistoryHandle,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            next = subscription.changed() => next,
            _ = cancel.cancelled() => break,
        };
        let Some(state) = next else {
            break;
        };

        let banner = banner::render(&state);
        if history.write().await.record(state, current_epoch_ms()) {
            match banner.message() {
                Some(message) => tracing::warn!("Banner {}: {}", banner, message),
                None => tracing::info!("Banner hidden"),
            }
        }
    }
    tracing::debug!("Transition recorder stopped");
}

fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
