use std::collections::BTreeSet;

use fleetwise_core::SiteId;
use serde::Serialize;

use crate::error::Result;

/// Create/edit/delete buckets that move one schedule's site assignment from
/// its current state to the desired one.
///
/// The buckets are pairwise disjoint, each sorted ascending, and together
/// cover `existing ∪ desired`. Plans are never persisted; compute a fresh
/// one whenever the selection changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub to_create: Vec<SiteId>,
    pub to_edit: Vec<SiteId>,
    pub to_delete: Vec<SiteId>,
}

impl ReconciliationPlan {
    pub fn compute(
        existing: impl IntoIterator<Item = SiteId>,
        desired: impl IntoIterator<Item = SiteId>,
    ) -> Self {
        let existing: BTreeSet<SiteId> = existing.into_iter().collect();
        let desired: BTreeSet<SiteId> = desired.into_iter().collect();

        Self {
            to_create: desired.difference(&existing).copied().collect(),
            to_edit: desired.intersection(&existing).copied().collect(),
            to_delete: existing.difference(&desired).copied().collect(),
        }
    }

    /// Number of per-site operations the plan describes.
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_edit.len() + self.to_delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse string site ids into [`SiteId`]s, deduplicated and sorted.
pub fn parse_site_ids<S: AsRef<str>>(ids: &[S]) -> Result<Vec<SiteId>> {
    let parsed = ids
        .iter()
        .map(|id| id.as_ref().parse::<SiteId>())
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(parsed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<SiteId> {
        raw.iter().copied().map(SiteId).collect()
    }

    #[test]
    fn splits_into_disjoint_buckets() {
        let plan = ReconciliationPlan::compute(ids(&[1, 2, 3]), ids(&[2, 3, 4]));
        assert_eq!(plan.to_create, ids(&[4]));
        assert_eq!(plan.to_edit, ids(&[2, 3]));
        assert_eq!(plan.to_delete, ids(&[1]));

        let mut union: Vec<SiteId> = plan
            .to_create
            .iter()
            .chain(&plan.to_edit)
            .chain(&plan.to_delete)
            .copied()
            .collect();
        union.sort();
        assert_eq!(union, ids(&[1, 2, 3, 4]));
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn duplicates_and_order_do_not_matter() {
        let a = ReconciliationPlan::compute(ids(&[3, 1, 1, 2]), ids(&[4, 2, 3, 4]));
        let b = ReconciliationPlan::compute(ids(&[1, 2, 3]), ids(&[2, 3, 4]));
        assert_eq!(a, b);
    }

    #[test]
    fn new_schedule_creates_everything() {
        let plan = ReconciliationPlan::compute(Vec::new(), ids(&[5, 6]));
        assert_eq!(plan.to_create, ids(&[5, 6]));
        assert!(plan.to_edit.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn empty_selection_deletes_everything() {
        let plan = ReconciliationPlan::compute(ids(&[5, 6]), Vec::new());
        assert_eq!(plan.to_delete, ids(&[5, 6]));
        assert!(ReconciliationPlan::compute(Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn parse_site_ids_normalizes_strings() {
        let parsed = parse_site_ids(&["10", "007", "10", " 3"]).unwrap();
        assert_eq!(parsed, ids(&[3, 7, 10]));
        assert!(parse_site_ids(&["10", "ten"]).is_err());
    }
}
