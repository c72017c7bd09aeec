//! Collision detection between a proposed schedule and a site's existing
//! schedules.
//!
//! Two independent checks run per candidate site:
//!
//! | Check   | Collides when                                              |
//! |---------|------------------------------------------------------------|
//! | time    | same local hour with either side daily, or same weekday too |
//! | plugins | the plugin sets are equal, ignoring order                  |
//!
//! The per-site aggregation keeps only the first error message it sees but
//! reports every colliding site.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Weekday};
use fleetwise_core::SiteId;
use serde::Serialize;
use thiserror::Error;

use crate::error::{Result, SchedulerError};
use crate::index::ScheduleIndex;
use crate::schedule::local_hour_and_weekday;
use crate::types::{Frequency, TimeSlot};

/// Why a proposed schedule cannot be accepted on a site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("the selected time has already passed")]
    PastTimestamp,

    #[error("another schedule already runs at {hour:02}:00 and one of them repeats daily")]
    DailyOverlap { hour: u32 },

    #[error("another weekly schedule already runs on {weekday} at {hour:02}:00")]
    WeeklyOverlap { weekday: Weekday, hour: u32 },

    #[error("select at least one plugin")]
    NoPlugins,

    #[error("a schedule with the same plugins already exists")]
    DuplicatePlugins,
}

/// Outcome of running one check across a set of sites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollisionResult {
    /// First error message encountered, `None` when nothing collided.
    pub error: Option<String>,
    /// Every site that produced an error, ascending.
    pub colliding_site_ids: Vec<SiteId>,
}

impl CollisionResult {
    pub fn has_collision(&self) -> bool {
        !self.colliding_site_ids.is_empty()
    }

    fn record(&mut self, site_id: SiteId, conflict: &Conflict) {
        if self.error.is_none() {
            self.error = Some(conflict.to_string());
        }
        self.colliding_site_ids.push(site_id);
    }
}

/// Both collision results for a rejected request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub time: CollisionResult,
    pub plugins: CollisionResult,
}

impl ValidationFailure {
    pub fn is_empty(&self) -> bool {
        !self.time.has_collision() && !self.plugins.has_collision()
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = [&self.time, &self.plugins]
            .into_iter()
            .filter_map(|r| {
                let msg = r.error.as_ref()?;
                let sites: Vec<String> =
                    r.colliding_site_ids.iter().map(|s| s.to_string()).collect();
                Some(format!("{msg} (sites: {})", sites.join(", ")))
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

/// Check a proposed time slot against the existing slots of one site.
///
/// Returns the first conflict found, scanning `existing` in order.
pub fn validate_time_slot<Tz: TimeZone>(
    proposed: &TimeSlot,
    existing: &[TimeSlot],
    now: &DateTime<Tz>,
) -> std::result::Result<(), Conflict> {
    if proposed.timestamp <= now.timestamp() {
        return Err(Conflict::PastTimestamp);
    }

    let tz = now.timezone();
    let Some((hour, weekday)) = local_hour_and_weekday(proposed.timestamp, &tz) else {
        return Err(Conflict::PastTimestamp);
    };

    for slot in existing {
        let Some((slot_hour, slot_weekday)) = local_hour_and_weekday(slot.timestamp, &tz) else {
            continue;
        };
        if slot_hour != hour {
            continue;
        }
        if proposed.frequency == Frequency::Daily || slot.frequency == Frequency::Daily {
            return Err(Conflict::DailyOverlap { hour });
        }
        if slot_weekday == weekday {
            return Err(Conflict::WeeklyOverlap { weekday, hour });
        }
    }

    Ok(())
}

/// Check a proposed plugin set against the existing plugin sets of one site.
pub fn validate_plugins(
    proposed: &[String],
    existing: &[Vec<String>],
) -> std::result::Result<(), Conflict> {
    if proposed.is_empty() {
        return Err(Conflict::NoPlugins);
    }

    let wanted: BTreeSet<&str> = proposed.iter().map(String::as_str).collect();
    let duplicate = existing
        .iter()
        .any(|set| set.iter().map(String::as_str).collect::<BTreeSet<_>>() == wanted);

    if duplicate {
        Err(Conflict::DuplicatePlugins)
    } else {
        Ok(())
    }
}

/// Run [`validate_time_slot`] once per site.
///
/// `exclude` names the schedule being edited so it is not compared with itself.
pub fn check_time_collisions<Tz: TimeZone>(
    index: &ScheduleIndex,
    site_ids: &[SiteId],
    proposed: &TimeSlot,
    exclude: Option<&str>,
    now: &DateTime<Tz>,
) -> CollisionResult {
    let mut result = CollisionResult::default();
    for &site_id in dedup(site_ids).iter() {
        let existing = index.time_slots_excluding(site_id, exclude);
        if let Err(conflict) = validate_time_slot(proposed, &existing, now) {
            result.record(site_id, &conflict);
        }
    }
    result
}

/// Run [`validate_plugins`] once per site.
pub fn check_plugin_collisions(
    index: &ScheduleIndex,
    site_ids: &[SiteId],
    plugins: &[String],
    exclude: Option<&str>,
) -> CollisionResult {
    let mut result = CollisionResult::default();
    for &site_id in dedup(site_ids).iter() {
        let existing = index.plugin_sets_excluding(site_id, exclude);
        if let Err(conflict) = validate_plugins(plugins, &existing) {
            result.record(site_id, &conflict);
        }
    }
    result
}

/// Run both checks; fails with [`SchedulerError::Validation`] if either collides.
pub fn validate_request<Tz: TimeZone>(
    index: &ScheduleIndex,
    site_ids: &[SiteId],
    proposed: &TimeSlot,
    plugins: &[String],
    exclude: Option<&str>,
    now: &DateTime<Tz>,
) -> Result<()> {
    let failure = ValidationFailure {
        time: check_time_collisions(index, site_ids, proposed, exclude, now),
        plugins: check_plugin_collisions(index, site_ids, plugins, exclude),
    };
    if failure.is_empty() {
        Ok(())
    } else {
        Err(SchedulerError::Validation(failure))
    }
}

fn dedup(site_ids: &[SiteId]) -> BTreeSet<SiteId> {
    site_ids.iter().copied().collect()
}
