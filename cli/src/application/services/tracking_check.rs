//! Application service — tracking-server reachability check.

use std::collections::BTreeSet;

use crate::application::ports::{ProgressReporter, TrackingProbe};
use crate::domain::{ConfigError, InstanceSpec};

/// Probe every distinct tracking URI the instances reference, once each.
///
/// # Errors
///
/// Returns [`ConfigError::TrackingUnreachable`] for the first URI whose probe
/// fails. No retry.
pub async fn ensure_tracking_reachable(
    probe: &impl TrackingProbe,
    instances: &[InstanceSpec],
    reporter: &impl ProgressReporter,
) -> Result<(), ConfigError> {
    let uris: BTreeSet<&str> = instances
        .iter()
        .filter_map(|i| i.tracking_uri.as_deref())
        .collect();

    for uri in uris {
        reporter.step(&format!("checking tracking server {uri}..."));
        probe.probe(uri).await.map_err(|e| {
            tracing::warn!(%uri, error = %e, "tracking server unreachable");
            ConfigError::TrackingUnreachable {
                uri: uri.to_string(),
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(%uri, "tracking server reachable");
    }
    Ok(())
}
