//! Runtime reachability signal
//!
//! The monitor treats the host runtime as an opaque capability: it can be
//! asked for a best-effort reachability reading, subscribed to for
//! reachability changes, and asked for a declared link hint.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{NetpulseError, Result};

const EVENT_CAPACITY: usize = 16;

/// A reachability change reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Lost,
    Restored,
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reachability::Lost => write!(f, "lost"),
            Reachability::Restored => write!(f, "restored"),
        }
    }
}

/// Effective connection type as declared by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

/// Declared link hint. Every field is optional because runtimes expose
/// different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkInfo {
    #[serde(default)]
    pub effective_type: Option<EffectiveType>,
    #[serde(default)]
    pub downlink_mbps: Option<f64>,
    #[serde(default)]
    pub rtt_ms: Option<u64>,
    #[serde(default)]
    pub save_data: bool,
}

/// Source of reachability events and link hints
pub trait ReachabilitySignal: Send + Sync + fmt::Debug {
    /// Best-effort synchronous reading; `None` when the runtime cannot tell
    fn is_reachable(&self) -> Option<bool>;

    /// Subscribe to reachability changes.
    ///
    /// Returns [`NetpulseError::SignalUnavailable`] when the runtime has no
    /// reachability capability at all.
    fn subscribe(&self) -> Result<broadcast::Receiver<Reachability>>;

    /// Declared link information, if the runtime provides any
    fn declared_link_info(&self) -> Option<LinkInfo>;
}

#[derive(Debug, Default)]
struct HostReading {
    reachable: Option<bool>,
    link_info: Option<LinkInfo>,
}

/// Reachability signal driven by the embedding host.
///
/// The host reports reachability through [`HostSignal::set_reachable`];
/// listeners are only notified when the reading actually changes.
#[derive(Debug)]
pub struct HostSignal {
    reading: Mutex<HostReading>,
    events: broadcast::Sender<Reachability>,
}

impl HostSignal {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            reading: Mutex::new(HostReading::default()),
            events,
        }
    }

    /// Create a signal with a known initial reading
    pub fn with_reachable(reachable: bool) -> Self {
        let signal = Self::new();
        signal.lock().reachable = Some(reachable);
        signal
    }

    /// Report the current reachability, emitting an event if it changed
    pub fn set_reachable(&self, reachable: bool) {
        let changed = {
            let mut reading = self.lock();
            let changed = reading.reachable != Some(reachable);
            reading.reachable = Some(reachable);
            changed
        };

        if changed {
            let event = if reachable {
                Reachability::Restored
            } else {
                Reachability::Lost
            };
            tracing::debug!("Reachability {}", event);
            // Err only means no listeners.
            let _ = self.events.send(event);
        }
    }

    /// Replace the declared link hint
    pub fn set_link_info(&self, link_info: Option<LinkInfo>) {
        self.lock().link_info = link_info;
    }

    /// Number of active event listeners
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostReading> {
        self.reading.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HostSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReachabilitySignal for HostSignal {
    fn is_reachable(&self) -> Option<bool> {
        self.lock().reachable
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<Reachability>> {
        Ok(self.events.subscribe())
    }

    fn declared_link_info(&self) -> Option<LinkInfo> {
        self.lock().link_info.clone()
    }
}

/// A runtime without any reachability capability
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSignal;

impl ReachabilitySignal for UnavailableSignal {
    fn is_reachable(&self) -> Option<bool> {
        None
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<Reachability>> {
        Err(NetpulseError::SignalUnavailable)
    }

    fn declared_link_info(&self) -> Option<LinkInfo> {
        None
    }
}
