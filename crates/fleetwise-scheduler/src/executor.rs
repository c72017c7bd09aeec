use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use fleetwise_core::config::{SchedulerConfig, CRON_PATH};
use fleetwise_core::SiteId;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ScheduleClient, SiteDirectory, TelemetrySink};
use crate::error::Result;
use crate::runner::run_bounded;
use crate::types::{
    Frequency, MonitorRequest, MonitorUrl, ScheduleBody, ScheduleTiming, SiteFailure, SiteOutcome,
};

/// Telemetry event recorded once per successfully created site.
pub const SCHEDULE_CREATED_EVENT: &str = "plugin_update_schedule_created";

/// Result of a create bucket. Partial success is represented here, never as
/// an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateReport {
    pub succeeded: Vec<SiteId>,
    pub failed: Vec<SiteFailure>,
    /// Monitor registrations that failed. These do not affect `succeeded`.
    pub monitor_failures: Vec<SiteFailure>,
}

impl CreateReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn error_count(&self) -> usize {
        self.failed.len()
    }

    /// Every site failed with the same message, e.g. because the batch call
    /// itself could not be made.
    pub fn all_failed(site_ids: &[SiteId], message: &str) -> Self {
        Self {
            failed: site_ids
                .iter()
                .map(|&site_id| SiteFailure {
                    site_id,
                    message: message.to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }
}

/// Result of a fully successful edit or delete bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<SiteId>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOperation {
    Edit,
    Delete,
}

impl std::fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchOperation::Edit => write!(f, "edit"),
            BatchOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Raised by edit/delete after every targeted site has been attempted and at
/// least one failed. Sites in `succeeded` were not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateBatchError {
    pub operation: BatchOperation,
    pub succeeded: Vec<SiteId>,
    pub failures: Vec<SiteFailure>,
}

impl AggregateBatchError {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn error_count(&self) -> usize {
        self.failures.len()
    }
}

impl std::fmt::Display for AggregateBatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .failures
            .iter()
            .map(|failure| format!("failed to {} schedule on {failure}", self.operation))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for AggregateBatchError {}

/// Executes reconciliation buckets against a [`ScheduleClient`].
///
/// The executor never touches the cached snapshot; callers invalidate it
/// once the buckets have settled.
pub struct BatchExecutor {
    client: Arc<dyn ScheduleClient>,
    telemetry: Arc<dyn TelemetrySink>,
    config: SchedulerConfig,
}

impl BatchExecutor {
    pub fn new(
        client: Arc<dyn ScheduleClient>,
        telemetry: Arc<dyn TelemetrySink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            client,
            telemetry,
            config,
        }
    }

    /// Create/edit body using the configured health-check paths.
    pub fn body(&self, plugins: &[String], frequency: Frequency, timestamp: i64) -> ScheduleBody {
        ScheduleBody {
            plugins: plugins.to_vec(),
            schedule: ScheduleTiming {
                interval: frequency,
                timestamp,
            },
            health_check_paths: self.config.health_check_paths.clone(),
        }
    }

    /// Create the schedule on every site with a single batch call, then
    /// register monitors for the sites that succeeded.
    ///
    /// Only a failure of the batch call itself is returned as `Err`.
    pub async fn create(
        &self,
        site_ids: &[SiteId],
        body: &ScheduleBody,
        sites: &dyn SiteDirectory,
    ) -> Result<CreateReport> {
        let targets: Vec<SiteId> = site_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if targets.is_empty() {
            return Ok(CreateReport::default());
        }

        debug!(sites = targets.len(), "batch create");
        let outcomes = self.client.batch_create(&targets, body).await?;
        let mut by_site: HashMap<SiteId, SiteOutcome> =
            outcomes.into_iter().map(|o| (o.site_id, o)).collect();

        let mut report = CreateReport::default();
        for site_id in targets {
            match by_site.remove(&site_id) {
                Some(outcome) if outcome.is_success() => report.succeeded.push(site_id),
                Some(outcome) => {
                    let message = outcome.error.unwrap_or_default();
                    warn!(site_id = %site_id, error = %message, "schedule create failed");
                    report.failed.push(SiteFailure { site_id, message });
                }
                None => {
                    warn!(site_id = %site_id, "batch create returned no result for site");
                    report.failed.push(SiteFailure {
                        site_id,
                        message: "no result returned for site".to_string(),
                    });
                }
            }
        }

        let succeeded: &[SiteId] = if self.telemetry.enabled() {
            report.succeeded.as_slice()
        } else {
            &[]
        };
        for &site_id in succeeded {
            self.telemetry.record(
                SCHEDULE_CREATED_EVENT,
                json!({
                    "site_id": site_id,
                    "frequency": body.schedule.interval,
                    "plugins": body.plugins.len(),
                }),
            );
        }

        report.monitor_failures = self.register_monitors(&report.succeeded, sites).await;

        info!(
            succeeded = report.success_count(),
            failed = report.error_count(),
            monitor_failures = report.monitor_failures.len(),
            "batch create finished"
        );
        Ok(report)
    }

    /// Edit the schedule on each site. All calls start at once.
    pub async fn edit(
        &self,
        site_ids: &[SiteId],
        schedule_id: &str,
        body: &ScheduleBody,
    ) -> std::result::Result<BatchReport, AggregateBatchError> {
        let calls = site_ids.iter().map(|&site_id| async move {
            (site_id, self.client.edit(site_id, schedule_id, body).await)
        });
        let results = join_all(calls).await;
        settle(BatchOperation::Edit, schedule_id, results)
    }

    /// Delete the schedule from each site. All calls start at once.
    pub async fn delete(
        &self,
        site_ids: &[SiteId],
        schedule_id: &str,
    ) -> std::result::Result<BatchReport, AggregateBatchError> {
        let calls = site_ids.iter().map(|&site_id| async move {
            (site_id, self.client.delete(site_id, schedule_id).await)
        });
        let results = join_all(calls).await;
        settle(BatchOperation::Delete, schedule_id, results)
    }

    async fn register_monitors(
        &self,
        site_ids: &[SiteId],
        sites: &dyn SiteDirectory,
    ) -> Vec<SiteFailure> {
        let check_interval = self.config.monitor_check_interval;
        let thunks = site_ids.iter().filter_map(|&site_id| {
            let Some(root) = sites.site_url(site_id) else {
                warn!(site_id = %site_id, "no site URL known, skipping monitor registration");
                return None;
            };
            let request = monitor_request(&root, check_interval);
            let client = Arc::clone(&self.client);
            Some(move || async move {
                let result = client.register_monitor(site_id, &request).await;
                (site_id, result)
            })
        });

        let mut failures: Vec<SiteFailure> = run_bounded(thunks, self.config.monitor_concurrency)
            .await
            .into_iter()
            .filter_map(|(site_id, result)| {
                let err = result.err()?;
                warn!(site_id = %site_id, error = %err, "monitor registration failed");
                Some(SiteFailure {
                    site_id,
                    message: err.to_string(),
                })
            })
            .collect();
        failures.sort_by_key(|f| f.site_id);
        failures
    }
}

/// Monitor the site root and its cron endpoint.
pub fn monitor_request(root_url: &str, check_interval: u32) -> MonitorRequest {
    let root = root_url.trim_end_matches('/');
    MonitorRequest {
        urls: vec![
            MonitorUrl {
                monitor_url: root.to_string(),
                check_interval,
            },
            MonitorUrl {
                monitor_url: format!("{root}{CRON_PATH}"),
                check_interval,
            },
        ],
    }
}

fn settle(
    operation: BatchOperation,
    schedule_id: &str,
    results: Vec<(SiteId, std::result::Result<(), ClientError>)>,
) -> std::result::Result<BatchReport, AggregateBatchError> {
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();

    for (site_id, result) in results {
        match result {
            Ok(()) => succeeded.push(site_id),
            Err(e) => {
                warn!(
                    %operation,
                    %schedule_id,
                    site_id = %site_id,
                    error = %e,
                    "per-site call failed"
                );
                failures.push(SiteFailure {
                    site_id,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        %operation,
        %schedule_id,
        succeeded = succeeded.len(),
        failed = failures.len(),
        "batch finished"
    );

    if failures.is_empty() {
        Ok(BatchReport { succeeded })
    } else {
        Err(AggregateBatchError {
            operation,
            succeeded,
            failures,
        })
    }
}
