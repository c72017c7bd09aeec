//! `fleetwise-scheduler`: reconciliation engine for plugin-update schedules
//! across a fleet of sites.
//!
//! # Overview
//!
//! An operator picks sites, plugins and a cadence. The engine validates the
//! choice against every selected site's existing schedules, diffs the
//! selection against the sites that already carry the schedule, and applies
//! the resulting create/edit/delete buckets through an abstract
//! [`ScheduleClient`].
//!
//! | Module      | Responsibility                                              |
//! |-------------|-------------------------------------------------------------|
//! | `schedule`  | Next-run timestamp for a daily/weekly cadence               |
//! | `collision` | Time-slot and plugin-set collision checks                   |
//! | `index`     | Per-site projections of the aggregated snapshot             |
//! | `plan`      | Desired vs existing site-set diff                           |
//! | `executor`  | Bucket execution, monitor registration, failure aggregation |
//! | `runner`    | Bounded-concurrency thunk runner                            |
//! | `normalize` | Route id ↔ canonical schedule id                            |
//! | `cache`     | Snapshot repository with explicit invalidation              |
//! | `engine`    | End-to-end `Reconciler`                                     |

pub mod cache;
pub mod client;
pub mod collision;
pub mod engine;
pub mod error;
pub mod executor;
pub mod index;
pub mod normalize;
pub mod plan;
pub mod runner;
pub mod schedule;
pub mod types;

pub use cache::{FileSnapshotSource, ScheduleRepository, SnapshotCache, SnapshotSource};
pub use client::{
    ClientError, NoopTelemetry, ScheduleClient, SiteDirectory, TelemetrySink, TracingTelemetry,
};
pub use collision::{CollisionResult, Conflict, ValidationFailure};
pub use engine::{plan_request, ReconcileReport, Reconciler, ScheduleRequest};
pub use error::{Result, SchedulerError};
pub use executor::{AggregateBatchError, BatchExecutor, BatchReport, CreateReport};
pub use index::ScheduleIndex;
pub use normalize::normalize_schedule_id;
pub use plan::ReconciliationPlan;
pub use runner::run_bounded;
pub use schedule::compute_timestamp;
pub use types::{AggregatedSnapshot, Frequency, Schedule, ScheduleBody, SiteOutcome, TimeSlot};
