use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use fleetwise_core::config::TelemetryConfig;
use fleetwise_core::SiteId;
use tracing::info;

use crate::types::{MonitorRequest, ScheduleBody, SiteOutcome};

/// Remote schedule service as seen by the engine.
///
/// Implementations own the transport; the engine only needs these four
/// operations. Every call is independent and may run concurrently with any
/// other.
#[async_trait]
pub trait ScheduleClient: Send + Sync {
    /// Create the same schedule on every site in one call. Per-site failures
    /// are reported in the returned outcomes, not as `Err`.
    async fn batch_create(
        &self,
        site_ids: &[SiteId],
        body: &ScheduleBody,
    ) -> Result<Vec<SiteOutcome>, ClientError>;

    async fn edit(
        &self,
        site_id: SiteId,
        schedule_id: &str,
        body: &ScheduleBody,
    ) -> Result<(), ClientError>;

    async fn delete(&self, site_id: SiteId, schedule_id: &str) -> Result<(), ClientError>;

    async fn register_monitor(
        &self,
        site_id: SiteId,
        request: &MonitorRequest,
    ) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a usable response.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered and refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Fire-and-forget analytics sink. Never awaited; return value unused.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &str, properties: serde_json::Value);

    /// `false` lets callers skip building event properties.
    fn enabled(&self) -> bool {
        true
    }
}

/// Emits telemetry events as structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: &str, properties: serde_json::Value) {
        info!(target: "fleetwise::telemetry", %event, %properties, "telemetry event");
    }
}

/// Drops every event. Used when telemetry is disabled in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: &str, _properties: serde_json::Value) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Sink selected by `[telemetry] enabled`.
pub fn telemetry_from_config(config: &TelemetryConfig) -> Arc<dyn TelemetrySink> {
    if config.enabled {
        Arc::new(TracingTelemetry)
    } else {
        Arc::new(NoopTelemetry)
    }
}

/// Resolves a site's root URL for monitor registration.
pub trait SiteDirectory: Send + Sync {
    fn site_url(&self, site_id: SiteId) -> Option<String>;
}

impl SiteDirectory for HashMap<SiteId, String> {
    fn site_url(&self, site_id: SiteId) -> Option<String> {
        self.get(&site_id).cloned()
    }
}

impl SiteDirectory for BTreeMap<SiteId, String> {
    fn site_url(&self, site_id: SiteId) -> Option<String> {
        self.get(&site_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_follows_config_switch() {
        assert!(telemetry_from_config(&TelemetryConfig { enabled: true }).enabled());
        assert!(!telemetry_from_config(&TelemetryConfig { enabled: false }).enabled());
    }

    #[test]
    fn site_directory_lookup() {
        let sites = BTreeMap::from([(SiteId(1), "https://one.example".to_string())]);
        assert_eq!(sites.site_url(SiteId(1)).as_deref(), Some("https://one.example"));
        assert_eq!(sites.site_url(SiteId(2)), None);
    }
}
