use std::collections::BTreeMap;

use fleetwise_core::SiteId;
use serde::{Deserialize, Deserializer, Serialize};

/// Recurrence granularity of a plugin-update schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Fires every day at the scheduled hour.
    Daily,
    /// Fires once a week on the scheduled weekday and hour.
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// A plugin-update schedule as it exists on one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub site_id: SiteId,
    /// Canonical storage key. The same key may exist on many sites.
    pub schedule_id: String,
    pub frequency: Frequency,
    /// Next run, unix seconds.
    pub timestamp: i64,
    /// Plugin slugs; order is irrelevant for comparisons.
    pub plugins: Vec<String>,
    pub last_run_timestamp: Option<i64>,
    pub active: bool,
}

impl Schedule {
    pub fn time_slot(&self) -> TimeSlot {
        TimeSlot {
            frequency: self.frequency,
            timestamp: self.timestamp,
        }
    }
}

/// The `(frequency, timestamp)` projection used for time-collision checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub frequency: Frequency,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Aggregated snapshot (wire shape of the multi-site read)
// ---------------------------------------------------------------------------

/// Response of the aggregated multi-site schedule read.
///
/// Site keys are decimal strings; schedule keys are canonical schedule ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSnapshot {
    #[serde(default, deserialize_with = "nullable_sites")]
    pub sites: BTreeMap<String, BTreeMap<String, SnapshotEntry>>,
}

/// One schedule entry inside [`AggregatedSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub timestamp: i64,
    pub schedule: Frequency,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub last_run_timestamp: Option<i64>,
    #[serde(default)]
    pub active: bool,
}

/// Accepts `null` for the whole map and `[]` for a site with no schedules,
/// both of which the aggregated endpoint emits for empty collections.
fn nullable_sites<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, BTreeMap<String, SnapshotEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SiteSchedules {
        Map(BTreeMap<String, SnapshotEntry>),
        Empty(Vec<serde_json::Value>),
    }

    let raw: Option<BTreeMap<String, SiteSchedules>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(site, schedules)| match schedules {
            SiteSchedules::Map(map) => (site, map),
            SiteSchedules::Empty(_) => (site, BTreeMap::new()),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Request / response bodies for the schedule client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTiming {
    pub interval: Frequency,
    pub timestamp: i64,
}

/// Body of a batch-create or per-site edit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBody {
    pub plugins: Vec<String>,
    pub schedule: ScheduleTiming,
    #[serde(default)]
    pub health_check_paths: Vec<String>,
}

/// Per-site entry of a batch-create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteOutcome {
    #[serde(alias = "siteId")]
    pub site_id: SiteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteOutcome {
    pub fn ok(site_id: SiteId) -> Self {
        Self {
            site_id,
            error: None,
        }
    }

    pub fn failed(site_id: SiteId, error: impl Into<String>) -> Self {
        Self {
            site_id,
            error: Some(error.into()),
        }
    }

    /// An empty error string counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self.error.as_deref(), Some(e) if !e.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorUrl {
    pub monitor_url: String,
    pub check_interval: u32,
}

/// Body of a monitor-registration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRequest {
    pub urls: Vec<MonitorUrl>,
}

/// A per-site failure captured during batch execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFailure {
    pub site_id: SiteId,
    pub message: String,
}

impl std::fmt::Display for SiteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "site {}: {}", self.site_id, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_wire_shape() {
        let json = r#"{
            "sites": {
                "12": {
                    "abc": {
                        "timestamp": 1700000000,
                        "schedule": "weekly",
                        "args": ["akismet", "jetpack"],
                        "last_run_timestamp": null,
                        "active": true
                    }
                },
                "34": []
            }
        }"#;
        let snapshot: AggregatedSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.sites.len(), 2);
        let entry = &snapshot.sites["12"]["abc"];
        assert_eq!(entry.schedule, Frequency::Weekly);
        assert_eq!(entry.args, vec!["akismet", "jetpack"]);
        assert!(entry.active);
        assert!(snapshot.sites["34"].is_empty());
    }

    #[test]
    fn snapshot_tolerates_missing_or_null_sites() {
        let missing: AggregatedSnapshot = serde_json::from_str("{}").unwrap();
        assert!(missing.sites.is_empty());
        let null: AggregatedSnapshot = serde_json::from_str(r#"{"sites": null}"#).unwrap();
        assert!(null.sites.is_empty());
    }

    #[test]
    fn create_body_serializes_expected_fields() {
        let body = ScheduleBody {
            plugins: vec!["akismet".into()],
            schedule: ScheduleTiming {
                interval: Frequency::Daily,
                timestamp: 1_700_000_000,
            },
            health_check_paths: Vec::new(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["schedule"]["interval"], "daily");
        assert_eq!(value["schedule"]["timestamp"], 1_700_000_000);
        assert_eq!(value["health_check_paths"], serde_json::json!([]));
    }

    #[test]
    fn site_outcome_accepts_camel_case_and_empty_error() {
        let outcome: SiteOutcome = serde_json::from_str(r#"{"siteId": 10}"#).unwrap();
        assert_eq!(outcome.site_id, SiteId(10));
        assert!(outcome.is_success());
        assert!(SiteOutcome::failed(SiteId(1), "").is_success());
        assert!(!SiteOutcome::failed(SiteId(1), "boom").is_success());
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!("hourly".parse::<Frequency>().is_err());
    }
}
