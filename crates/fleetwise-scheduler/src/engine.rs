use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use fleetwise_core::SiteId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    cache::ScheduleRepository,
    client::SiteDirectory,
    collision::validate_request,
    error::Result,
    executor::{AggregateBatchError, BatchExecutor, BatchReport, CreateReport},
    index::ScheduleIndex,
    normalize::normalize_schedule_id,
    plan::ReconciliationPlan,
    schedule::compute_timestamp,
    types::{Frequency, TimeSlot},
};

/// What the operator submitted for one logical schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Route-level id of the schedule being edited, possibly display-suffixed.
    /// `None` when creating a new schedule.
    #[serde(default)]
    pub schedule_id: Option<String>,
    /// Sites that should carry the schedule after reconciliation.
    pub site_ids: Vec<SiteId>,
    pub plugins: Vec<String>,
    pub frequency: Frequency,
    /// Only consulted for weekly schedules.
    #[serde(default)]
    pub weekday: String,
    /// `HH:MM`
    pub time: String,
}

/// Settled outcome of one reconciliation.
#[derive(Debug)]
pub struct ReconcileReport {
    /// Canonical id the plan was computed for, if any.
    pub schedule_id: Option<String>,
    pub timestamp: i64,
    pub plan: ReconciliationPlan,
    pub create: CreateReport,
    pub edit: std::result::Result<BatchReport, AggregateBatchError>,
    pub delete: std::result::Result<BatchReport, AggregateBatchError>,
}

impl ReconcileReport {
    pub fn success_count(&self) -> usize {
        self.create.success_count() + bucket_successes(&self.edit) + bucket_successes(&self.delete)
    }

    pub fn error_count(&self) -> usize {
        self.create.error_count() + bucket_errors(&self.edit) + bucket_errors(&self.delete)
    }

    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }
}

fn bucket_successes(bucket: &std::result::Result<BatchReport, AggregateBatchError>) -> usize {
    match bucket {
        Ok(report) => report.success_count(),
        Err(err) => err.success_count(),
    }
}

fn bucket_errors(bucket: &std::result::Result<BatchReport, AggregateBatchError>) -> usize {
    bucket.as_ref().err().map_or(0, AggregateBatchError::error_count)
}

/// Validate `request` against `index` and diff its site selection against
/// the sites that already carry the schedule. Returns the plan together with
/// the computed next-run timestamp.
pub fn plan_request<Tz: TimeZone>(
    index: &ScheduleIndex,
    request: &ScheduleRequest,
    now: &DateTime<Tz>,
) -> Result<(ReconciliationPlan, i64)> {
    let canonical = request.schedule_id.as_deref().map(normalize_schedule_id);
    let timestamp = compute_timestamp(request.frequency, &request.weekday, &request.time, now)?;
    let proposed = TimeSlot {
        frequency: request.frequency,
        timestamp,
    };
    validate_request(
        index,
        &request.site_ids,
        &proposed,
        &request.plugins,
        canonical,
        now,
    )?;

    let existing = canonical
        .map(|id| index.sites_with_schedule(id))
        .unwrap_or_default();
    let plan = ReconciliationPlan::compute(existing, request.site_ids.iter().copied());
    Ok((plan, timestamp))
}

/// Drives one reconciliation end to end: validate, plan, execute, invalidate.
pub struct Reconciler {
    executor: BatchExecutor,
    repository: Arc<dyn ScheduleRepository>,
    sites: Arc<dyn SiteDirectory>,
}

impl Reconciler {
    pub fn new(
        executor: BatchExecutor,
        repository: Arc<dyn ScheduleRepository>,
        sites: Arc<dyn SiteDirectory>,
    ) -> Self {
        Self {
            executor,
            repository,
            sites,
        }
    }

    /// Plan `request` against the current snapshot without touching the
    /// client. Fails with [`SchedulerError::Validation`](crate::SchedulerError::Validation)
    /// on any collision.
    pub async fn preview<Tz: TimeZone>(
        &self,
        request: &ScheduleRequest,
        now: &DateTime<Tz>,
    ) -> Result<(ReconciliationPlan, i64)> {
        let snapshot = self.repository.snapshot().await?;
        plan_request(&ScheduleIndex::build(&snapshot), request, now)
    }

    /// Validate and apply `request`.
    ///
    /// Validation failures return before any client call. Once execution
    /// starts, every bucket runs to completion and per-site failures are
    /// reported in the returned [`ReconcileReport`] rather than as `Err`.
    /// The snapshot is invalidated after the buckets settle.
    pub async fn submit<Tz: TimeZone>(
        &self,
        request: &ScheduleRequest,
        now: &DateTime<Tz>,
    ) -> Result<ReconcileReport> {
        let (plan, timestamp) = self.preview(request, now).await?;
        let canonical = request
            .schedule_id
            .as_deref()
            .map(normalize_schedule_id)
            .map(str::to_string);

        if plan.is_empty() {
            return Ok(ReconcileReport {
                schedule_id: canonical,
                timestamp,
                plan,
                create: CreateReport::default(),
                edit: Ok(BatchReport::default()),
                delete: Ok(BatchReport::default()),
            });
        }

        info!(
            schedule_id = canonical.as_deref().unwrap_or("<new>"),
            create = plan.to_create.len(),
            edit = plan.to_edit.len(),
            delete = plan.to_delete.len(),
            "reconciling schedule"
        );

        let body = self
            .executor
            .body(&request.plugins, request.frequency, timestamp);
        let schedule_id = canonical.as_deref().unwrap_or_default();

        let (create, edit, delete) = tokio::join!(
            self.executor.create(&plan.to_create, &body, self.sites.as_ref()),
            self.executor.edit(&plan.to_edit, schedule_id, &body),
            self.executor.delete(&plan.to_delete, schedule_id),
        );

        self.repository.invalidate(canonical.as_deref()).await;

        let create = create.unwrap_or_else(|e| {
            warn!(error = %e, "batch create call failed");
            CreateReport::all_failed(&plan.to_create, &e.to_string())
        });

        let report = ReconcileReport {
            schedule_id: canonical,
            timestamp,
            plan,
            create,
            edit,
            delete,
        };
        info!(
            succeeded = report.success_count(),
            failed = report.error_count(),
            "reconciliation finished"
        );
        Ok(report)
    }
}
