use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use chrono::{Local, TimeZone};
use fleetwise_core::config::FleetwiseConfig;
use fleetwise_scheduler::collision::{check_plugin_collisions, check_time_collisions};
use fleetwise_scheduler::normalize::display_schedule_id;
use fleetwise_scheduler::plan::parse_site_ids;
use fleetwise_scheduler::schedule::compute_timestamp_local;
use fleetwise_scheduler::types::{AggregatedSnapshot, TimeSlot};
use fleetwise_scheduler::{
    compute_timestamp, normalize_schedule_id, plan_request, FileSnapshotSource, ScheduleIndex,
    ScheduleRepository, ScheduleRequest, SchedulerError, SnapshotCache, ValidationFailure,
};
use serde_json::json;
use tracing::info;

use crate::{CadenceArgs, SelectionArgs};

pub fn next_run(cadence: &CadenceArgs) -> anyhow::Result<()> {
    let timestamp = compute_timestamp_local(
        cadence.frequency,
        cadence.weekday.as_deref().unwrap_or_default(),
        &cadence.time,
    )?;

    print_json(&json!({
        "frequency": cadence.frequency,
        "timestamp": timestamp,
        "local": Local.timestamp_opt(timestamp, 0).single().map(|t| t.to_rfc3339()),
    }))
}

pub fn normalize(id: &str) -> anyhow::Result<()> {
    println!("{}", normalize_schedule_id(id));
    Ok(())
}

pub async fn list(snapshot: &Path) -> anyhow::Result<()> {
    let index = ScheduleIndex::build(&*load_snapshot(snapshot).await?);

    let rows: Vec<_> = index
        .iter()
        .map(|schedule| {
            json!({
                "site_id": schedule.site_id,
                "schedule_id": schedule.schedule_id,
                "display_id": display_schedule_id(
                    &schedule.schedule_id,
                    schedule.frequency,
                    schedule.timestamp,
                    &Local,
                ),
                "frequency": schedule.frequency,
                "timestamp": schedule.timestamp,
                "plugins": schedule.plugins,
                "active": schedule.active,
            })
        })
        .collect();

    info!(schedules = rows.len(), sites = index.site_ids().count(), "snapshot listed");
    print_json(&rows)
}

pub async fn check(selection: &SelectionArgs) -> anyhow::Result<()> {
    let index = ScheduleIndex::build(&*load_snapshot(&selection.snapshot).await?);
    let request = schedule_request(selection)?;
    let exclude = request.schedule_id.as_deref().map(normalize_schedule_id);
    let now = Local::now();

    let proposed = TimeSlot {
        frequency: request.frequency,
        timestamp: compute_timestamp(request.frequency, &request.weekday, &request.time, &now)?,
    };
    let failure = ValidationFailure {
        time: check_time_collisions(&index, &request.site_ids, &proposed, exclude, &now),
        plugins: check_plugin_collisions(&index, &request.site_ids, &request.plugins, exclude),
    };

    print_json(&failure)?;
    if !failure.is_empty() {
        bail!("{failure}");
    }
    Ok(())
}

pub async fn plan(selection: &SelectionArgs) -> anyhow::Result<()> {
    let index = ScheduleIndex::build(&*load_snapshot(&selection.snapshot).await?);
    let request = schedule_request(selection)?;

    match plan_request(&index, &request, &Local::now()) {
        Ok((plan, timestamp)) => print_json(&json!({
            "schedule_id": request.schedule_id.as_deref().map(normalize_schedule_id),
            "timestamp": timestamp,
            "operations": plan.len(),
            "plan": plan,
        })),
        Err(SchedulerError::Validation(failure)) => {
            print_json(&failure)?;
            bail!("{failure}");
        }
        Err(e) => Err(e.into()),
    }
}

pub fn show_config(config: &FleetwiseConfig) -> anyhow::Result<()> {
    print_json(config)
}

fn schedule_request(selection: &SelectionArgs) -> anyhow::Result<ScheduleRequest> {
    Ok(ScheduleRequest {
        schedule_id: selection.schedule_id.clone(),
        site_ids: parse_site_ids(selection.sites.as_slice())?,
        plugins: selection.plugins.clone(),
        frequency: selection.cadence.frequency,
        weekday: selection.cadence.weekday.clone().unwrap_or_default(),
        time: selection.cadence.time.clone(),
    })
}

async fn load_snapshot(path: &Path) -> anyhow::Result<Arc<AggregatedSnapshot>> {
    let cache = SnapshotCache::new(FileSnapshotSource::new(path));
    Ok(cache.snapshot().await?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
