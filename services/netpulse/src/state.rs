//! Connectivity state and transition history

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::banner::Banner;

/// Coarse classification of link quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionSpeed {
    Fast,
    Slow,
    Unknown,
}

impl fmt::Display for ConnectionSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSpeed::Fast => write!(f, "fast"),
            ConnectionSpeed::Slow => write!(f, "slow"),
            ConnectionSpeed::Unknown => write!(f, "unknown"),
        }
    }
}

/// The current connectivity reading shared with every observer.
///
/// `connection_speed` only carries meaning while `is_online` is true. The
/// offline constructor pins it to [`ConnectionSpeed::Unknown`] so an offline
/// reading can never look like a fast link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_online: bool,
    pub connection_speed: ConnectionSpeed,
}

impl ConnectivityState {
    /// Optimistic startup reading: online and fast until a probe says otherwise
    pub const fn optimistic() -> Self {
        Self::online(ConnectionSpeed::Fast)
    }

    pub const fn online(connection_speed: ConnectionSpeed) -> Self {
        Self {
            is_online: true,
            connection_speed,
        }
    }

    pub const fn offline() -> Self {
        Self {
            is_online: false,
            connection_speed: ConnectionSpeed::Unknown,
        }
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::optimistic()
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_online {
            write!(f, "online/{}", self.connection_speed)
        } else {
            write!(f, "offline")
        }
    }
}

/// Record of an observed state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub previous: ConnectivityState,
    pub current: ConnectivityState,
    pub banner: Banner,
    pub timestamp_epoch_ms: u64,
}

/// Bounded history of state transitions plus the latest reading
#[derive(Debug)]
pub struct StatusHistory {
    pub latest: ConnectivityState,
    pub transitions: VecDeque<TransitionRecord>,
    pub max_size: usize,
}

impl StatusHistory {
    pub fn new(initial: ConnectivityState, max_size: usize) -> Self {
        Self {
            latest: initial,
            transitions: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Record a new reading, returning true if it differed from the latest one
    pub fn record(&mut self, current: ConnectivityState, now_ms: u64) -> bool {
        let previous = self.latest;
        if previous == current {
            return false;
        }
        self.latest = current;

        if self.max_size == 0 {
            return true;
        }
        if self.transitions.len() >= self.max_size {
            self.transitions.pop_front();
        }
        self.transitions.push_back(TransitionRecord {
            previous,
            current,
            banner: crate::banner::render(&current),
            timestamp_epoch_ms: now_ms,
        });
        true
    }
}

/// Thread-safe history handle shared by the recorder and the status server
pub type HistoryHandle = Arc<RwLock<StatusHistory>>;

pub fn new_history_handle(initial: ConnectivityState, max_size: usize) -> HistoryHandle {
    Arc::new(RwLock::new(StatusHistory::new(initial, max_size)))
}
