//! Connectivity monitor
//!
//! Keeps a single [`ConnectivityState`] up to date from reachability events
//! and periodic link probes, and shares it with any number of observers.
//!
//! All observers share one driver task. The driver starts when the first
//! observer subscribes and stops when the last one goes away, so there is no
//! background work while nobody is watching. At most one probe is in flight
//! at any time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::banner;
use crate::classify::ClassificationPolicy;
use crate::config::Config;
use crate::error::NetpulseError;
use crate::probe::{Measurement, Probe};
use crate::signal::{Reachability, ReachabilitySignal};
use crate::state::ConnectivityState;

/// Shortest probe cadence the driver accepts
const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(1);

/// Probe cadence, probe bound and classification policy
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub policy: ClassificationPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            probe_interval: config.probing.interval(),
            probe_timeout: config.probing.timeout(),
            policy: ClassificationPolicy::from(&config.classification),
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    observers: usize,
    driver: Option<CancellationToken>,
    signal_unavailable: bool,
}

struct Shared {
    signal: Arc<dyn ReachabilitySignal>,
    probe: Arc<dyn Probe>,
    settings: MonitorSettings,
    state_tx: watch::Sender<ConnectivityState>,
    disposed: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl Shared {
    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> ConnectivityState {
        *self.state_tx.borrow()
    }

    /// Replace the state, notifying observers only on an actual change
    fn set_state(&self, next: ConnectivityState) -> bool {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            info!(
                "Connectivity is now {} (banner: {})",
                next,
                banner::render(&next)
            );
        }
        changed
    }

    /// Publish on behalf of a driver. A cancelled driver never publishes:
    /// cancellation happens under the same lock. An online reading is
    /// refused while the signal already reports a loss.
    fn publish(&self, driver: &CancellationToken, next: ConnectivityState) -> bool {
        let _lifecycle = self.lock_lifecycle();
        if driver.is_cancelled() {
            return false;
        }
        if next.is_online && self.signal.is_reachable() == Some(false) {
            debug!("Signal reports a loss, not publishing {}", next);
            return false;
        }
        self.set_state(next)
    }

    /// Apply a loss the signal reports but the driver has not handled yet.
    /// Called with the lifecycle lock held.
    fn apply_pending_loss(&self, lifecycle: &Lifecycle) {
        if lifecycle.driver.is_none() {
            return;
        }
        if self.current().is_online && self.signal.is_reachable() == Some(false) {
            self.set_state(ConnectivityState::offline());
        }
    }

    /// Latest reading as seen by an observer
    fn observe(&self) -> ConnectivityState {
        let lifecycle = self.lock_lifecycle();
        self.apply_pending_loss(&lifecycle);
        self.current()
    }

    /// Start a driver. Called with the lifecycle lock held.
    fn start(self: &Arc<Self>, lifecycle: &mut Lifecycle) {
        if lifecycle.signal_unavailable {
            return;
        }

        // Subscribe before reading so no change slips in between.
        let events = match self.signal.subscribe() {
            Ok(events) => events,
            Err(e) => {
                warn!("{}; assuming online and fast, probing disabled", e);
                lifecycle.signal_unavailable = true;
                self.set_state(ConnectivityState::optimistic());
                return;
            }
        };

        let initial = match self.signal.is_reachable() {
            Some(false) => ConnectivityState::offline(),
            Some(true) | None => {
                let previous = self.current();
                if previous.is_online {
                    previous
                } else {
                    ConnectivityState::optimistic()
                }
            }
        };
        self.set_state(initial);

        let cancel = CancellationToken::new();
        let driver = Driver::new(Arc::clone(self), events, cancel.clone());
        tokio::spawn(driver.run());
        lifecycle.driver = Some(cancel);
        info!("Probe loop started using '{}'", self.probe.name());
    }

    fn release(&self) {
        let mut lifecycle = self.lock_lifecycle();
        lifecycle.observers = lifecycle.observers.saturating_sub(1);
        if lifecycle.observers == 0 {
            if let Some(driver) = lifecycle.driver.take() {
                driver.cancel();
                info!("Last observer left, probe loop paused");
            }
        }
    }
}

/// Shared connectivity monitor.
///
/// Cheap to clone; clones share the same state and driver.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &self.shared.current())
            .field("probe", &self.shared.probe.name())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor. Nothing runs until the first subscription.
    pub fn new(
        signal: Arc<dyn ReachabilitySignal>,
        probe: Arc<dyn Probe>,
        mut settings: MonitorSettings,
    ) -> Self {
        if settings.probe_interval < MIN_PROBE_INTERVAL {
            warn!(
                "Probe interval {:?} is too short, using {:?}",
                settings.probe_interval, MIN_PROBE_INTERVAL
            );
            settings.probe_interval = MIN_PROBE_INTERVAL;
        }
        let (state_tx, _) = watch::channel(ConnectivityState::optimistic());
        Self {
            shared: Arc::new(Shared {
                signal,
                probe,
                settings,
                state_tx,
                disposed: CancellationToken::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Register an observer and return the current reading with it.
    ///
    /// The first observer starts the shared driver task.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime while no driver is running.
    pub fn subscribe(&self) -> (ConnectivityState, Subscription) {
        let mut lifecycle = self.shared.lock_lifecycle();
        lifecycle.observers += 1;
        if lifecycle.driver.is_none() && !self.shared.disposed.is_cancelled() {
            self.shared.start(&mut lifecycle);
        } else {
            self.shared.apply_pending_loss(&lifecycle);
        }

        let mut rx = self.shared.state_tx.subscribe();
        let current = *rx.borrow_and_update();
        debug!("Observer subscribed (observers: {})", lifecycle.observers);
        drop(lifecycle);

        let subscription = Subscription {
            rx,
            closed: self.shared.disposed.clone(),
            shared: Arc::clone(&self.shared),
        };
        (current, subscription)
    }

    /// Latest reading. A loss the signal already reports is applied first.
    pub fn current(&self) -> ConnectivityState {
        self.shared.observe()
    }

    pub fn observer_count(&self) -> usize {
        self.shared.lock_lifecycle().observers
    }

    /// Whether the driver task is active
    pub fn is_running(&self) -> bool {
        self.shared.lock_lifecycle().driver.is_some()
    }

    /// Stop the driver for good and end every subscription.
    ///
    /// Later subscriptions still receive the last reading but never change.
    pub fn dispose(&self) {
        let mut lifecycle = self.shared.lock_lifecycle();
        self.shared.disposed.cancel();
        if let Some(driver) = lifecycle.driver.take() {
            driver.cancel();
        }
        info!("Connectivity monitor disposed");
    }
}

/// An observer's handle on the monitor. Dropping it unsubscribes.
pub struct Subscription {
    rx: watch::Receiver<ConnectivityState>,
    closed: CancellationToken,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("current", &*self.rx.borrow())
            .finish()
    }
}

impl Subscription {
    /// Wait for the next reading. Returns `None` once the monitor is disposed.
    pub async fn changed(&mut self) -> Option<ConnectivityState> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            result = self.rx.changed() => match result {
                Ok(()) => Some(*self.rx.borrow_and_update()),
                Err(_) => None,
            },
        }
    }

    /// Latest reading without waiting
    pub fn current(&self) -> ConnectivityState {
        self.shared.observe()
    }

    /// Detach from the monitor
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.release();
        debug!("Observer unsubscribed");
    }
}

type ProbeOutcome = (u64, crate::Result<Measurement>);

/// The per-activation driver: reachability events, probe completions and
/// the probe cadence, multiplexed on one task
struct Driver {
    shared: Arc<Shared>,
    events: Option<broadcast::Receiver<Reachability>>,
    cancel: CancellationToken,
    cadence: Interval,
    probes: JoinSet<ProbeOutcome>,
    generation: u64,
}

impl Driver {
    fn new(
        shared: Arc<Shared>,
        events: broadcast::Receiver<Reachability>,
        cancel: CancellationToken,
    ) -> Self {
        let mut cadence = time::interval(shared.settings.probe_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            shared,
            events: Some(events),
            cancel,
            cadence,
            probes: JoinSet::new(),
            generation: 0,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Probe loop cancelled");
                    break;
                }
                event = next_event(&mut self.events) => self.on_event(event),
                Some(joined) = self.probes.join_next() => self.on_probe_finished(joined),
                _ = self.cadence.tick() => self.on_tick(),
            }
        }
        self.probes.abort_all();
    }

    fn on_event(&mut self, event: Result<Reachability, RecvError>) {
        match event {
            Ok(reachability) => self.on_reachability(reachability),
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    "Missed {} reachability events, resynchronising",
                    skipped
                );
                match self.shared.signal.is_reachable() {
                    Some(true) => self.on_reachability(Reachability::Restored),
                    Some(false) => self.on_reachability(Reachability::Lost),
                    None => {}
                }
            }
            Err(RecvError::Closed) => {
                warn!("Reachability signal closed, continuing with probes only");
                self.events = None;
            }
        }
    }

    fn on_reachability(&mut self, reachability: Reachability) {
        debug!("Reachability {}", reachability);
        match reachability {
            Reachability::Lost => {
                self.cancel_probes();
                self.shared
                    .publish(&self.cancel, ConnectivityState::offline());
            }
            Reachability::Restored => {
                let was_online = self.shared.current().is_online;
                if !was_online {
                    // Drop the pre-outage classification; the fresh probe decides.
                    self.shared
                        .publish(&self.cancel, ConnectivityState::optimistic());
                }
                if !was_online || self.probes.is_empty() {
                    self.start_probe();
                    self.cadence.reset();
                }
            }
        }
    }

    fn on_tick(&mut self) {
        if !self.shared.current().is_online {
            debug!("Offline, skipping probe");
            return;
        }
        if !self.probes.is_empty() {
            debug!("Probe still in flight, skipping cycle");
            return;
        }
        self.start_probe();
    }

    fn on_probe_finished(&mut self, joined: Result<ProbeOutcome, JoinError>) {
        let name = self.shared.probe.name();
        let (generation, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                warn!("Probe '{}' task failed: {}", name, e);
                return;
            }
        };

        if generation != self.generation {
            debug!("Discarding stale result from probe '{}'", name);
            return;
        }

        let current = self.shared.current();
        if !current.is_online {
            debug!("Discarding probe result while offline");
            return;
        }

        match result {
            Ok(measurement) => match self.shared.settings.policy.classify(&measurement) {
                Some(speed) => {
                    debug!("Probe '{}' classified link as {}", name, speed);
                    self.shared
                        .publish(&self.cancel, ConnectivityState::online(speed));
                }
                None => debug!(
                    "Probe '{}' gave no usable reading, keeping {}",
                    name, current.connection_speed
                ),
            },
            Err(e) => warn!(
                "Probe '{}' failed: {}; keeping {}",
                name, e, current.connection_speed
            ),
        }
    }

    fn start_probe(&mut self) {
        self.cancel_probes();

        let probe = Arc::clone(&self.shared.probe);
        let timeout = self.shared.settings.probe_timeout;
        let generation = self.generation;
        debug!("Starting probe '{}'", probe.name());

        self.probes.spawn(async move {
            let result = match time::timeout(timeout, probe.measure()).await {
                Ok(result) => result,
                Err(_) => Err(NetpulseError::ProbeTimeout(timeout)),
            };
            (generation, result)
        });
    }

    /// Abort any in-flight probe and invalidate its result
    fn cancel_probes(&mut self) {
        self.probes.abort_all();
        self.generation += 1;
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<Reachability>>,
) -> Result<Reachability, RecvError> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}
