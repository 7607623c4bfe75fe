//! The in-flight flow-update queue correlating barrier xids to `nb_cfg`
//! configuration revisions, and the small stats struct `put()` accumulates
//! per call. Grounded on `ofctrl_flow_update`/the `flow_updates` list and
//! the barrier-tracking tail of `ofctrl_put` in the original.

use std::collections::VecDeque;

use tracing::warn;

use crate::connection::Xid;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FlowUpdate {
    pub xid: Xid,
    pub nb_cfg: i64,
}

/// FIFO of outstanding barrier round-trips, oldest first — matches the
/// original's `ovs_list` used front-to-back for lookups and back-to-front
/// for the reverse scan in `ofctrl_put`.
#[derive(Debug, Default)]
pub(crate) struct FlowUpdateQueue {
    updates: VecDeque<FlowUpdate>,
}

impl FlowUpdateQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.updates.clear();
    }

    pub(crate) fn front(&self) -> Option<&FlowUpdate> {
        self.updates.front()
    }

    pub(crate) fn pop_front(&mut self) {
        self.updates.pop_front();
    }

    pub(crate) fn back_set_nb_cfg(&mut self, nb_cfg: i64) {
        if let Some(back) = self.updates.back_mut() {
            back.nb_cfg = nb_cfg;
        }
    }

    /// Reverse-scans from the back, matching `LIST_FOR_EACH_REVERSE_SAFE`:
    ///
    /// * drops any trailing entries whose `nb_cfg` is *greater* than the new
    ///   one (a database regression — logged as a warning, since `nb_cfg`
    ///   should be monotonic);
    /// * if an entry for exactly this `nb_cfg` is found, advances its xid
    ///   target in place instead of appending a duplicate;
    /// * otherwise appends a fresh entry once the scan reaches an older
    ///   `nb_cfg` (or the front of the queue).
    pub(crate) fn record(&mut self, xid: Xid, nb_cfg: i64) {
        while let Some(back) = self.updates.back() {
            if nb_cfg < back.nb_cfg {
                warn!(from = back.nb_cfg, to = nb_cfg, "nb_cfg regressed");
                self.updates.pop_back();
            } else if nb_cfg == back.nb_cfg {
                self.updates.back_mut().unwrap().xid = xid;
                return;
            } else {
                break;
            }
        }
        self.updates.push_back(FlowUpdate { xid, nb_cfg });
    }
}

/// Per-`put()`-call counters, mirrored into the `metrics` facade by the
/// engine; kept as plain fields so tests can assert on them without a
/// metrics recorder installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileStats {
    pub flows_added: u64,
    pub flows_modified: u64,
    pub flows_removed: u64,
    pub groups_added: u64,
    pub groups_removed: u64,
    pub meters_added: u64,
    pub meters_removed: u64,
    pub ct_zones_flushed: u64,
}

impl ReconcileStats {
    pub(crate) fn record_to_metrics(&self) {
        metrics::counter!("ofctrl_flows_added_total").increment(self.flows_added);
        metrics::counter!("ofctrl_flows_modified_total").increment(self.flows_modified);
        metrics::counter!("ofctrl_flows_removed_total").increment(self.flows_removed);
        metrics::counter!("ofctrl_groups_added_total").increment(self.groups_added);
        metrics::counter!("ofctrl_groups_removed_total").increment(self.groups_removed);
        metrics::counter!("ofctrl_meters_added_total").increment(self.meters_added);
        metrics::counter!("ofctrl_meters_removed_total").increment(self.meters_removed);
        metrics::counter!("ofctrl_ct_zones_flushed_total").increment(self.ct_zones_flushed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_advances_xid_for_same_nb_cfg() {
        let mut q = FlowUpdateQueue::new();
        q.record(1, 10);
        q.record(2, 10);
        assert_eq!(q.updates.len(), 1);
        assert_eq!(q.updates.back().unwrap().xid, 2);
    }

    #[test]
    fn record_drops_regressed_entries() {
        let mut q = FlowUpdateQueue::new();
        q.record(1, 10);
        q.record(2, 20);
        q.record(3, 15);
        // 15 < 20: the nb_cfg=20 entry regressed away, 15 appended fresh.
        assert_eq!(q.updates.len(), 2);
        assert_eq!(q.updates.back().unwrap().nb_cfg, 15);
    }

    #[test]
    fn record_appends_when_newer() {
        let mut q = FlowUpdateQueue::new();
        q.record(1, 10);
        q.record(2, 20);
        assert_eq!(q.updates.len(), 2);
    }
}
