//! Configuration types for the netpulse service

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::signal::EffectiveType;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub probing: ProbingConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    #[serde(default)]
    pub status_server: StatusServerConfig,
}

/// Probe configuration with tagged enum for extensibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProbeConfig {
    #[serde(rename = "http_transfer")]
    HttpTransfer {
        #[serde(default = "default_probe_url")]
        url: String,
    },
    #[serde(rename = "declared_link")]
    DeclaredLink,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::HttpTransfer {
            url: default_probe_url(),
        }
    }
}

/// Probe cadence and bound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbingConfig {
    #[serde(default = "default_probe_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

impl ProbingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_probe_interval(),
            timeout_ms: default_probe_timeout(),
        }
    }
}

/// Thresholds for the fast/slow decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_slow_below_mbps")]
    pub slow_below_mbps: f64,
    #[serde(default)]
    pub slow_above_rtt_ms: Option<u64>,
    #[serde(default = "default_constrained_types")]
    pub constrained_types: Vec<EffectiveType>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            slow_below_mbps: default_slow_below_mbps(),
            slow_above_rtt_ms: None,
            constrained_types: default_constrained_types(),
        }
    }
}

/// Reachability signal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReachabilityConfig {
    #[serde(rename = "tcp_connect")]
    TcpConnect {
        #[serde(default = "default_targets")]
        targets: Vec<String>,
        #[serde(default = "default_check_interval")]
        check_interval_seconds: u64,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_ms: u64,
    },
    #[serde(rename = "disabled")]
    Disabled,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        ReachabilityConfig::TcpConnect {
            targets: default_targets(),
            check_interval_seconds: default_check_interval(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// Status server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_status_port")]
    pub port: u16,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for StatusServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_status_port(),
            history_size: default_history_size(),
        }
    }
}

impl Config {
    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.probing.interval_seconds == 0 {
            return Err(crate::NetpulseError::Config(
                "probing.interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.probing.timeout_ms == 0 {
            return Err(crate::NetpulseError::Config(
                "probing.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !self.classification.slow_below_mbps.is_finite()
            || self.classification.slow_below_mbps < 0.0
        {
            return Err(crate::NetpulseError::Config(format!(
                "classification.slow_below_mbps must be a non-negative number, got {}",
                self.classification.slow_below_mbps
            )));
        }
        if let ProbeConfig::HttpTransfer { url } = &self.probe {
            if url.is_empty() {
                return Err(crate::NetpulseError::Config(
                    "probe.url must not be empty".to_string(),
                ));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(crate::NetpulseError::Config(format!(
                    "probe.url must be an http(s) URL, got {}",
                    url
                )));
            }
        }
        if let ReachabilityConfig::TcpConnect {
            targets,
            check_interval_seconds,
            connect_timeout_ms,
        } = &self.reachability
        {
            if targets.is_empty() {
                return Err(crate::NetpulseError::Config(
                    "reachability.targets must not be empty".to_string(),
                ));
            }
            if *check_interval_seconds == 0 {
                return Err(crate::NetpulseError::Config(
                    "reachability.check_interval_seconds must be greater than 0".to_string(),
                ));
            }
            if *connect_timeout_ms == 0 {
                return Err(crate::NetpulseError::Config(
                    "reachability.connect_timeout_ms must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn default_probe_url() -> String {
    // 128 KiB fixed payload
    "https://speed.cloudflare.com/__down?bytes=131072".to_string()
}

fn default_probe_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5000
}

fn default_slow_below_mbps() -> f64 {
    1.0
}

fn default_constrained_types() -> Vec<EffectiveType> {
    vec![EffectiveType::Slow2g, EffectiveType::TwoG]
}

fn default_targets() -> Vec<String> {
    vec!["1.1.1.1:443".to_string(), "8.8.8.8:53".to_string()]
}

fn default_check_interval() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_status_port() -> u16 {
    11120
}

fn default_history_size() -> usize {
    100
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::NetpulseError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
