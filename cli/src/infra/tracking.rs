//! Infrastructure implementation of the `TrackingProbe` port.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::TrackingProbe;

/// Timeout for a single reachability request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues one blocking `GET` per probe on the blocking thread pool.
#[derive(Debug, Clone, Copy)]
pub struct UreqTrackingProbe {
    timeout: Duration,
}

impl UreqTrackingProbe {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for UreqTrackingProbe {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

impl TrackingProbe for UreqTrackingProbe {
    async fn probe(&self, uri: &str) -> Result<()> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let url = uri.to_string();
        let result = tokio::task::spawn_blocking(move || agent.get(&url).call())
            .await
            .context("tracking probe task failed")?;
        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => anyhow::bail!("GET {uri} returned HTTP {code}"),
            Err(e) => Err(e).with_context(|| format!("GET {uri} failed")),
        }
    }
}
