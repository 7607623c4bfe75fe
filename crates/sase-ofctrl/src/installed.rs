//! The installed flow table: the engine's belief about what is actually
//! programmed on the switch right now. Rebuilt incrementally by
//! [`crate::engine::Engine::put`] as it diffs against the desired table.
//!
//! Grounded on `installed_flow`/`link_installed_to_desired`/
//! `unlink_installed_to_desired` in the original controller. There, an
//! installed flow holds a raw pointer to its "primary" desired flow plus an
//! intrusive list of every desired flow also mapped onto it; here both
//! become plain `DesiredId`s so no lifetime or aliasing reasoning is needed
//! to walk them.

use std::collections::HashMap;

use tracing::debug;

use crate::desired::DesiredFlowTable;
use crate::flow::{Flow, FlowKey};
use crate::ids::{DesiredId, IdGen, InstalledId};

struct InstalledEntry {
    flow: Flow,
    /// Every desired flow currently mapped onto this installed flow, most
    /// recently linked first.
    desired_refs: Vec<DesiredId>,
    /// The desired flow this installed flow was originally created to
    /// satisfy. Stays fixed across `link` calls that add additional
    /// `desired_refs`; reassigned to the new head of `desired_refs` when the
    /// primary itself unlinks.
    primary: Option<DesiredId>,
}

#[derive(Default)]
pub struct InstalledFlowTable {
    by_key: HashMap<FlowKey, InstalledId>,
    entries: HashMap<InstalledId, InstalledEntry>,
    ids: IdGen,
}

impl InstalledFlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn lookup(&self, key: &FlowKey) -> Option<InstalledId> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn flow(&self, id: InstalledId) -> Option<&Flow> {
        self.entries.get(&id).map(|e| &e.flow)
    }

    pub(crate) fn insert(&mut self, flow: Flow) -> InstalledId {
        let id = self.ids.next(InstalledId::from_raw);
        self.by_key.insert(flow.key.clone(), id);
        self.entries.insert(
            id,
            InstalledEntry {
                flow,
                desired_refs: Vec::new(),
                primary: None,
            },
        );
        id
    }

    pub(crate) fn replace_content(&mut self, id: InstalledId, flow: Flow) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.flow = flow;
        }
    }

    /// Idempotent: relinking the same `(installed, desired)` pair the
    /// `desired` is already the primary of is a no-op. Otherwise `desired`
    /// is pushed onto the front of `desired_refs`, and becomes the primary
    /// if there wasn't one yet (mirrors `link_installed_to_desired`, which
    /// only guards on `i->desired_flow == d`, not general list membership —
    /// the diff loop in `put` only ever links a given pair once per pass).
    pub(crate) fn link(
        &mut self,
        installed_id: InstalledId,
        desired_id: DesiredId,
        desired_table: &mut DesiredFlowTable,
    ) {
        let Some(entry) = self.entries.get_mut(&installed_id) else {
            return;
        };
        if entry.primary == Some(desired_id) {
            return;
        }
        if entry.primary.is_none() {
            entry.primary = Some(desired_id);
        }
        entry.desired_refs.insert(0, desired_id);
        desired_table.set_installed(desired_id, Some(installed_id));
    }

    /// Detaches every desired flow currently referencing `installed_id`,
    /// clearing their back-links. Called at the top of each `put()` diff
    /// pass (`unlink_all_refs_for_installed_flow`) so stale links from the
    /// previous pass don't leak into this one's relinking decisions.
    pub(crate) fn unlink_all(&mut self, installed_id: InstalledId, desired_table: &mut DesiredFlowTable) {
        let Some(entry) = self.entries.get_mut(&installed_id) else {
            return;
        };
        for desired_id in entry.desired_refs.drain(..) {
            desired_table.set_installed(desired_id, None);
        }
        entry.primary = None;
    }

    /// Removes an installed flow. Only valid once nothing references it
    /// (callers unlink first).
    pub(crate) fn remove(&mut self, installed_id: InstalledId) -> Option<Flow> {
        let entry = self.entries.remove(&installed_id)?;
        self.by_key.remove(&entry.flow.key);
        Some(entry.flow)
    }

    /// Drops every installed flow without touching the desired side's
    /// back-links. Used when the switch itself was just wiped (reconnect)
    /// and there is no desired table to hand in at this call site; any
    /// desired entry still pointing at one of these now-gone ids is a
    /// harmless stale index (it is diagnostic only — the next `put()` pass
    /// looks installed flows up by key, not by this back-link, and
    /// overwrites it once it relinks) until the next `put()` call corrects
    /// it.
    pub fn clear(&mut self) {
        debug!(count = self.entries.len(), "clearing installed flow table");
        self.entries.clear();
        self.by_key.clear();
    }

    pub(crate) fn ids(&self) -> Vec<InstalledId> {
        self.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Match;

    #[test]
    fn link_sets_primary_once() {
        let mut installed = InstalledFlowTable::new();
        let mut desired = DesiredFlowTable::new();
        let id = installed.insert(Flow::new(0, 1, Match::new(), vec![1], 0));
        let d1 = crate::ids::DesiredId::from_raw(1);
        let d2 = crate::ids::DesiredId::from_raw(2);

        installed.link(id, d1, &mut desired);
        installed.link(id, d2, &mut desired);
        let entry = installed.entries.get(&id).unwrap();
        assert_eq!(entry.primary, Some(d1));
        assert_eq!(entry.desired_refs, vec![d2, d1]);
    }

    #[test]
    fn relinking_same_primary_is_noop() {
        let mut installed = InstalledFlowTable::new();
        let mut desired = DesiredFlowTable::new();
        let id = installed.insert(Flow::new(0, 1, Match::new(), vec![1], 0));
        let d1 = crate::ids::DesiredId::from_raw(1);
        installed.link(id, d1, &mut desired);
        installed.link(id, d1, &mut desired);
        let entry = installed.entries.get(&id).unwrap();
        assert_eq!(entry.desired_refs, vec![d1]);
    }
}
