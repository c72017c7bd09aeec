use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use fleetwise_core::SiteId;
use tracing::warn;

use crate::types::{AggregatedSnapshot, Schedule, TimeSlot};

/// Read-only per-site projection of an [`AggregatedSnapshot`].
///
/// Built once per snapshot and never patched; rebuild it after the snapshot
/// is refetched.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    schedules: BTreeMap<SiteId, BTreeMap<String, Schedule>>,
    time_slots: HashMap<SiteId, Vec<TimeSlot>>,
    plugin_sets: HashMap<SiteId, Vec<Vec<String>>>,
}

impl ScheduleIndex {
    /// Build the index. Site keys that are not numeric are skipped.
    pub fn build(snapshot: &AggregatedSnapshot) -> Self {
        let mut schedules: BTreeMap<SiteId, BTreeMap<String, Schedule>> = BTreeMap::new();

        for (site_key, entries) in &snapshot.sites {
            let site_id: SiteId = match site_key.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(site_key = %site_key, "skipping snapshot entry with non-numeric site id");
                    continue;
                }
            };

            let site = schedules.entry(site_id).or_default();
            for (schedule_id, entry) in entries {
                site.insert(
                    schedule_id.clone(),
                    Schedule {
                        site_id,
                        schedule_id: schedule_id.clone(),
                        frequency: entry.schedule,
                        timestamp: entry.timestamp,
                        plugins: entry.args.clone(),
                        last_run_timestamp: entry.last_run_timestamp,
                        active: entry.active,
                    },
                );
            }
        }

        let time_slots = schedules
            .iter()
            .map(|(site, entries)| (*site, entries.values().map(Schedule::time_slot).collect()))
            .collect();
        let plugin_sets = schedules
            .iter()
            .map(|(site, entries)| (*site, entries.values().map(|s| s.plugins.clone()).collect()))
            .collect();

        Self {
            schedules,
            time_slots,
            plugin_sets,
        }
    }

    /// Time slots of every schedule on `site_id`.
    pub fn time_slots(&self, site_id: SiteId) -> &[TimeSlot] {
        self.time_slots.get(&site_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Plugin sets of every schedule on `site_id`.
    pub fn plugin_sets(&self, site_id: SiteId) -> &[Vec<String>] {
        self.plugin_sets.get(&site_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Time slots on `site_id`, leaving out `schedule_id` when given.
    ///
    /// Used when editing a schedule so it is not checked against its own
    /// current slot. Borrows the precomputed slots when nothing is excluded.
    pub fn time_slots_excluding(
        &self,
        site_id: SiteId,
        schedule_id: Option<&str>,
    ) -> Cow<'_, [TimeSlot]> {
        match self.excluded(site_id, schedule_id) {
            Some(id) => Cow::Owned(self.others(site_id, id).map(Schedule::time_slot).collect()),
            None => Cow::Borrowed(self.time_slots(site_id)),
        }
    }

    pub fn plugin_sets_excluding(
        &self,
        site_id: SiteId,
        schedule_id: Option<&str>,
    ) -> Cow<'_, [Vec<String>]> {
        match self.excluded(site_id, schedule_id) {
            Some(id) => Cow::Owned(self.others(site_id, id).map(|s| s.plugins.clone()).collect()),
            None => Cow::Borrowed(self.plugin_sets(site_id)),
        }
    }

    pub fn schedule(&self, site_id: SiteId, schedule_id: &str) -> Option<&Schedule> {
        self.schedules.get(&site_id)?.get(schedule_id)
    }

    pub fn schedules_for(&self, site_id: SiteId) -> impl Iterator<Item = &Schedule> {
        self.schedules.get(&site_id).into_iter().flat_map(|m| m.values())
    }

    /// Every schedule in the index, ordered by site then schedule id.
    pub fn iter(&self) -> impl Iterator<Item = &Schedule> {
        self.schedules.values().flat_map(|m| m.values())
    }

    /// Sites that currently carry `schedule_id`.
    pub fn sites_with_schedule(&self, schedule_id: &str) -> BTreeSet<SiteId> {
        self.schedules
            .iter()
            .filter(|(_, entries)| entries.contains_key(schedule_id))
            .map(|(site, _)| *site)
            .collect()
    }

    pub fn site_ids(&self) -> impl Iterator<Item = SiteId> + '_ {
        self.schedules.keys().copied()
    }

    /// Total number of schedules across all sites.
    pub fn len(&self) -> usize {
        self.schedules.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `schedule_id` if `site_id` actually carries it.
    fn excluded<'a>(&self, site_id: SiteId, schedule_id: Option<&'a str>) -> Option<&'a str> {
        schedule_id.filter(|id| self.schedule(site_id, id).is_some())
    }

    fn others<'a>(
        &'a self,
        site_id: SiteId,
        schedule_id: &'a str,
    ) -> impl Iterator<Item = &'a Schedule> + 'a {
        self.schedules_for(site_id)
            .filter(move |s| s.schedule_id != schedule_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frequency, SnapshotEntry};

    fn entry(timestamp: i64, schedule: Frequency, args: &[&str]) -> SnapshotEntry {
        SnapshotEntry {
            timestamp,
            schedule,
            args: args.iter().map(|s| s.to_string()).collect(),
            last_run_timestamp: None,
            active: true,
        }
    }

    fn snapshot() -> AggregatedSnapshot {
        let mut sites = BTreeMap::new();
        sites.insert(
            "1".to_string(),
            BTreeMap::from([
                ("shared".to_string(), entry(100, Frequency::Daily, &["a", "b"])),
                ("solo".to_string(), entry(200, Frequency::Weekly, &["c"])),
            ]),
        );
        sites.insert(
            "2".to_string(),
            BTreeMap::from([("shared".to_string(), entry(100, Frequency::Daily, &["a", "b"]))]),
        );
        sites.insert("3".to_string(), BTreeMap::new());
        sites.insert(
            "not-a-site".to_string(),
            BTreeMap::from([("x".to_string(), entry(1, Frequency::Daily, &["z"]))]),
        );
        AggregatedSnapshot { sites }
    }

    #[test]
    fn empty_snapshot_yields_empty_index() {
        let index = ScheduleIndex::build(&AggregatedSnapshot::default());
        assert!(index.is_empty());
        assert!(index.time_slots(SiteId(1)).is_empty());
        assert!(index.plugin_sets(SiteId(1)).is_empty());
    }

    #[test]
    fn projects_slots_and_plugin_sets_per_site() {
        let index = ScheduleIndex::build(&snapshot());
        assert_eq!(index.len(), 3);

        let slots = index.time_slots(SiteId(1));
        assert_eq!(slots.len(), 2);
        assert!(slots.contains(&TimeSlot {
            frequency: Frequency::Weekly,
            timestamp: 200
        }));
        assert_eq!(index.plugin_sets(SiteId(2)), &[vec!["a".to_string(), "b".to_string()]]);
        assert!(index.time_slots(SiteId(3)).is_empty());
    }

    #[test]
    fn non_numeric_site_keys_are_skipped() {
        let index = ScheduleIndex::build(&snapshot());
        let sites: Vec<_> = index.site_ids().collect();
        assert_eq!(sites, vec![SiteId(1), SiteId(2), SiteId(3)]);
    }

    #[test]
    fn same_schedule_id_on_many_sites() {
        let index = ScheduleIndex::build(&snapshot());
        let sites = index.sites_with_schedule("shared");
        assert_eq!(sites, BTreeSet::from([SiteId(1), SiteId(2)]));
        assert!(index.sites_with_schedule("missing").is_empty());
        assert_eq!(index.schedule(SiteId(2), "shared").unwrap().site_id, SiteId(2));
    }

    #[test]
    fn excluding_drops_only_the_named_schedule() {
        let index = ScheduleIndex::build(&snapshot());
        let slots = index.time_slots_excluding(SiteId(1), Some("shared"));
        assert_eq!(slots, vec![TimeSlot {
            frequency: Frequency::Weekly,
            timestamp: 200
        }]);
        assert_eq!(index.plugin_sets_excluding(SiteId(1), None).len(), 2);
    }

    #[test]
    fn nothing_excluded_reuses_precomputed_slots() {
        let index = ScheduleIndex::build(&snapshot());
        assert!(matches!(index.time_slots_excluding(SiteId(1), None), Cow::Borrowed(_)));
        assert!(matches!(
            index.plugin_sets_excluding(SiteId(1), Some("missing")),
            Cow::Borrowed(_)
        ));
        assert!(matches!(
            index.time_slots_excluding(SiteId(1), Some("shared")),
            Cow::Owned(_)
        ));
    }
}
