//! Link quality probes

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::ProbeConfig;
use crate::error::NetpulseError;
use crate::io::HttpClient;
use crate::signal::{LinkInfo, ReachabilitySignal};

/// Raw result of one probe cycle
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// A timed transfer of `bytes` that took `elapsed`
    Transfer { bytes: u64, elapsed: Duration },
    /// A link hint declared by the runtime
    Declared(LinkInfo),
}

/// Trait for measuring current link quality
#[async_trait]
pub trait Probe: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Take one measurement
    async fn measure(&self) -> crate::Result<Measurement>;
}

/// Build the probe described by the configuration
pub fn from_config(
    config: &ProbeConfig,
    http: Arc<dyn HttpClient>,
    signal: Arc<dyn ReachabilitySignal>,
) -> Arc<dyn Probe> {
    match config {
        ProbeConfig::HttpTransfer { url } => Arc::new(HttpTransferProbe::new(url.clone(), http)),
        ProbeConfig::DeclaredLink => Arc::new(DeclaredLinkProbe::new(signal)),
    }
}

/// Times a small HTTP download
pub struct HttpTransferProbe {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpTransferProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransferProbe")
            .field("url", &self.url)
            .finish()
    }
}

impl HttpTransferProbe {
    pub fn new(url: String, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created HttpTransferProbe for {}", url);
        Self { url, http }
    }
}

#[async_trait]
impl Probe for HttpTransferProbe {
    fn name(&self) -> &str {
        "http_transfer"
    }

    async fn measure(&self) -> crate::Result<Measurement> {
        let started = Instant::now();
        let response = self.http.get(&self.url).await?;
        let elapsed = started.elapsed();

        if !response.is_success() {
            return Err(NetpulseError::Probe(format!(
                "GET {} returned status {}",
                self.url, response.status
            )));
        }

        let bytes = response.body.len() as u64;
        tracing::debug!("Transferred {} bytes in {:?}", bytes, elapsed);
        Ok(Measurement::Transfer { bytes, elapsed })
    }
}

/// Reads the link hint the runtime declares
#[derive(Debug)]
pub struct DeclaredLinkProbe {
    signal: Arc<dyn ReachabilitySignal>,
}

impl DeclaredLinkProbe {
    pub fn new(signal: Arc<dyn ReachabilitySignal>) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl Probe for DeclaredLinkProbe {
    fn name(&self) -> &str {
        "declared_link"
    }

    async fn measure(&self) -> crate::Result<Measurement> {
        self.signal
            .declared_link_info()
            .map(Measurement::Declared)
            .ok_or_else(|| NetpulseError::Probe("no declared link info".to_string()))
    }
}
