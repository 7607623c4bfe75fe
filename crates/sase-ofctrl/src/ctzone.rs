//! Conntrack zone flush tracking. A logical datapath that changes enough to
//! need its conntrack entries wiped queues a zone id here; the reconciler
//! drains queued zones into `CT_ZONE_FLUSH` messages and watches for the
//! barrier reply that confirms the switch actually did it, mirroring
//! `ct_zone_pending_entry`/`CT_ZONE_OF_QUEUED`/`CT_ZONE_OF_SENT`/
//! `CT_ZONE_DB_QUEUED` in the original.

use std::collections::HashMap;

use crate::connection::Xid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtZoneState {
    /// Queued locally, not yet sent to the switch.
    OfQueued,
    /// Sent to the switch as part of an OpenFlow batch; `of_xid` carries the
    /// batch's barrier xid once assigned.
    OfSent,
    /// The switch confirmed the flush (barrier replied); waiting for the
    /// embedder to persist that fact to its own database.
    DbQueued,
}

#[derive(Debug, Clone)]
pub struct CtZonePendingEntry {
    pub zone: u16,
    pub state: CtZoneState,
    pub of_xid: Option<Xid>,
}

/// Keyed by datapath/zone name, matching the `shash` the original keys
/// pending entries by.
#[derive(Debug, Default)]
pub struct CtZoneTable {
    entries: HashMap<String, CtZonePendingEntry>,
}

impl CtZoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, name: impl Into<String>, zone: u16) {
        self.entries.insert(
            name.into(),
            CtZonePendingEntry {
                zone,
                state: CtZoneState::OfQueued,
                of_xid: None,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&CtZonePendingEntry> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<CtZonePendingEntry> {
        self.entries.remove(name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut CtZonePendingEntry)> {
        self.entries.iter_mut()
    }

    /// Resets every in-flight flush to `OfQueued` so it gets resent after a
    /// reconnect (`ofctrl_run`'s seqno-changed branch).
    pub(crate) fn requeue_in_flight(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.state == CtZoneState::OfSent {
                entry.state = CtZoneState::OfQueued;
            }
        }
    }
}
