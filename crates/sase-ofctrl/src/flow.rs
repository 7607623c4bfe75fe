//! The flow value: an OpenFlow match key plus the actions/cookie installed
//! against it, and the hash used to index both the desired and installed
//! flow tables.

use fxhash::FxHasher;
use ipnet::IpNet;
use std::hash::{Hash, Hasher};

/// A structured OpenFlow match. Only the fields the reconciliation engine's
/// logical pipeline actually emits are modeled; this is not a general OXM
/// decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Match {
    pub in_port: Option<u32>,
    pub metadata: Option<(u64, u64)>,
    pub eth_type: Option<u16>,
    pub eth_src: Option<[u8; 6]>,
    pub eth_dst: Option<[u8; 6]>,
    pub ip_proto: Option<u8>,
    pub ip_src: Option<IpNet>,
    pub ip_dst: Option<IpNet>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
    pub conj_id: Option<u32>,
    /// `(register number, value, mask)`, kept sorted by register number so
    /// that two logically identical matches hash and compare equal
    /// regardless of the order fields were set in.
    pub regs: Vec<(u8, u32, u32)>,
    /// Geneve tunnel metadata option value, once negotiated
    /// (`mff_ovn_geneve`, set by value/mask).
    pub tun_metadata: Option<(u64, u64)>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or overwrites) a register match, keeping `regs` sorted.
    pub fn set_reg(&mut self, reg: u8, value: u32, mask: u32) {
        match self.regs.binary_search_by_key(&reg, |(r, _, _)| *r) {
            Ok(idx) => self.regs[idx] = (reg, value, mask),
            Err(idx) => self.regs.insert(idx, (reg, value, mask)),
        }
    }
}

/// The part of a flow that identifies it in a flow table: OpenFlow table,
/// priority and match. Two flows with the same key are the same flow as far
/// as the switch is concerned, even if their actions differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub table_id: u8,
    pub priority: u16,
    pub matc: Match,
}

impl FlowKey {
    pub fn new(table_id: u8, priority: u16, matc: Match) -> Self {
        Self {
            table_id,
            priority,
            matc,
        }
    }

    /// Content hash of the key, used to bucket lookups the way
    /// `ovn_flow_match_hash` combines `(table_id, priority)` with the match's
    /// own hash rather than relying solely on the derived `Hash` impl (kept
    /// distinct from `Hash::hash` so the value is stable to expose in logs
    /// and metrics labels).
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        (((self.table_id as u32) << 16) | self.priority as u32).hash(&mut hasher);
        self.matc.hash(&mut hasher);
        hasher.finish()
    }
}

/// A full OpenFlow flow entry: the matching key plus the action list and
/// cookie that would be installed for it. `actions` is kept as an opaque
/// byte sequence (rather than a decoded action list) because the
/// reconciler only ever needs to compare, concatenate, and forward it — the
/// switch-specific action encoding is a collaborator's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub key: FlowKey,
    pub actions: Vec<u8>,
    pub cookie: u64,
}

impl Flow {
    pub fn new(
        table_id: u8,
        priority: u16,
        matc: Match,
        actions: Vec<u8>,
        cookie: u64,
    ) -> Self {
        Self {
            key: FlowKey::new(table_id, priority, matc),
            actions,
            cookie,
        }
    }

    pub fn hash(&self) -> u64 {
        self.key.content_hash()
    }

    /// Whether the installable content of two flows (actions, cookie) is
    /// identical. Keys are assumed equal (only meaningful when comparing two
    /// flows that share a table slot).
    pub fn content_eq(&self, other: &Flow) -> bool {
        self.actions == other.actions && self.cookie == other.cookie
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "table={} priority={} cookie={:#x} actions_len={}",
            self.key.table_id,
            self.key.priority,
            self.cookie,
            self.actions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_hash_identically() {
        let mut m1 = Match::new();
        m1.set_reg(1, 5, 0xffff_ffff);
        m1.set_reg(0, 1, 0xffff_ffff);

        let mut m2 = Match::new();
        m2.set_reg(0, 1, 0xffff_ffff);
        m2.set_reg(1, 5, 0xffff_ffff);

        let k1 = FlowKey::new(0, 100, m1);
        let k2 = FlowKey::new(0, 100, m2);
        assert_eq!(k1, k2);
        assert_eq!(k1.content_hash(), k2.content_hash());
    }

    #[test]
    fn different_priority_differs() {
        let k1 = FlowKey::new(0, 100, Match::new());
        let k2 = FlowKey::new(0, 200, Match::new());
        assert_ne!(k1, k2);
    }

    #[test]
    fn content_eq_ignores_key() {
        let f1 = Flow::new(0, 1, Match::new(), vec![1, 2, 3], 42);
        let f2 = Flow::new(0, 1, Match::new(), vec![1, 2, 3], 42);
        assert!(f1.content_eq(&f2));
        let f3 = Flow::new(0, 1, Match::new(), vec![1, 2, 4], 42);
        assert!(!f1.content_eq(&f3));
    }
}
