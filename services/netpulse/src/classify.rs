//! Link speed classification policy

use std::time::Duration;

use crate::config::ClassificationConfig;
use crate::probe::Measurement;
use crate::signal::{EffectiveType, LinkInfo};
use crate::state::ConnectionSpeed;

/// Deterministic fast/slow policy applied to every probe measurement
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationPolicy {
    /// Throughput below this many megabits per second is slow
    pub slow_below_mbps: f64,
    /// Latency above this many milliseconds is slow, when set
    pub slow_above_rtt_ms: Option<u64>,
    /// Declared connection types treated as constrained
    pub constrained_types: Vec<EffectiveType>,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self::from(&ClassificationConfig::default())
    }
}

impl From<&ClassificationConfig> for ClassificationPolicy {
    fn from(config: &ClassificationConfig) -> Self {
        Self {
            slow_below_mbps: config.slow_below_mbps,
            slow_above_rtt_ms: config.slow_above_rtt_ms,
            constrained_types: config.constrained_types.clone(),
        }
    }
}

impl ClassificationPolicy {
    /// Classify a measurement.
    ///
    /// Returns `None` when the measurement carries nothing to decide on, in
    /// which case the caller keeps its previous classification.
    pub fn classify(&self, measurement: &Measurement) -> Option<ConnectionSpeed> {
        match measurement {
            Measurement::Transfer { bytes, elapsed } => self.classify_transfer(*bytes, *elapsed),
            Measurement::Declared(info) => self.classify_declared(info),
        }
    }

    fn classify_transfer(&self, bytes: u64, elapsed: Duration) -> Option<ConnectionSpeed> {
        if let Some(limit) = self.slow_above_rtt_ms {
            if elapsed > Duration::from_millis(limit) {
                return Some(ConnectionSpeed::Slow);
            }
        }

        // An empty body says nothing about throughput.
        if bytes == 0 {
            return None;
        }

        match throughput_mbps(bytes, elapsed) {
            Some(mbps) if mbps < self.slow_below_mbps => Some(ConnectionSpeed::Slow),
            _ => Some(ConnectionSpeed::Fast),
        }
    }

    fn classify_declared(&self, info: &LinkInfo) -> Option<ConnectionSpeed> {
        let mut decided = false;

        if info.save_data {
            return Some(ConnectionSpeed::Slow);
        }

        if let Some(effective_type) = info.effective_type {
            decided = true;
            if self.constrained_types.contains(&effective_type) {
                return Some(ConnectionSpeed::Slow);
            }
        }

        if let Some(downlink) = info.downlink_mbps {
            decided = true;
            if downlink < self.slow_below_mbps {
                return Some(ConnectionSpeed::Slow);
            }
        }

        if let Some(rtt) = info.rtt_ms {
            decided = true;
            if self.slow_above_rtt_ms.is_some_and(|limit| rtt > limit) {
                return Some(ConnectionSpeed::Slow);
            }
        }

        decided.then_some(ConnectionSpeed::Fast)
    }
}

/// Throughput in megabits per second; `None` for an instantaneous transfer
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(bytes as f64 * 8.0 / secs / 1_000_000.0)
}
