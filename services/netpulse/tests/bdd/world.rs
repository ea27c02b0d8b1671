//! BDD test world for netpulse service

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cucumber::World;
use tokio::sync::{mpsc, Mutex, Notify};

use netpulse::probe::{Measurement, Probe};
use netpulse::signal::HostSignal;
use netpulse::{Banner, ConnectivityMonitor, ConnectivityState, NetpulseError, Subscription};

pub const WAIT: Duration = Duration::from_secs(2);

/// A probe whose measurements are handed out by the scenario
#[derive(Debug)]
pub struct ScriptedProbe {
    results: Mutex<mpsc::UnboundedReceiver<netpulse::Result<Measurement>>>,
    calls: AtomicUsize,
    answered: AtomicUsize,
    started: Notify,
}

impl ScriptedProbe {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<netpulse::Result<Measurement>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(Self {
            results: Mutex::new(rx),
            calls: AtomicUsize::new(0),
            answered: AtomicUsize::new(0),
            started: Notify::new(),
        });
        (probe, tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Measurements handed back to the monitor so far
    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }

    pub async fn wait_started(&self) {
        tokio::time::timeout(WAIT, self.started.notified())
            .await
            .expect("probe was not started");
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn measure(&self) -> netpulse::Result<Measurement> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        let result = self
            .results
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(|| Err(NetpulseError::Probe("script ended".to_string())));
        self.answered.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[derive(Debug, Default, World)]
pub struct NetpulseWorld {
    // Monitor testing
    pub signal: Option<Arc<HostSignal>>,
    pub signal_unavailable: bool,
    pub probe: Option<Arc<ScriptedProbe>>,
    pub script: Option<mpsc::UnboundedSender<netpulse::Result<Measurement>>>,
    pub monitor: Option<ConnectivityMonitor>,
    pub subscription: Option<Subscription>,
    pub last_state: Option<ConnectivityState>,

    // Banner testing
    pub banner_state: Option<ConnectivityState>,
    pub banner: Option<Banner>,
}
