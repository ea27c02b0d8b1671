//! Error types for the netpulse service

use std::time::Duration;

/// Errors that can occur in the netpulse service
#[derive(Debug, thiserror::Error)]
pub enum NetpulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Reachability signal unavailable")]
    SignalUnavailable,
}

/// Result type alias for netpulse operations
pub type Result<T> = std::result::Result<T, NetpulseError>;
