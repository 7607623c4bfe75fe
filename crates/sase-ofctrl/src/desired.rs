//! The desired flow table: the in-memory picture of "what the switch's flow
//! table should contain", built up by callers through [`DesiredFlowTable`]
//! and diffed against installed state by [`crate::engine::Engine::put`].
//!
//! Grounded on `ofctrl_check_and_add_flow`/`ofctrl_add_or_append_flow`/
//! `ofctrl_remove_flows`/`ofctrl_flood_remove_flows` in the original
//! controller: a desired flow is keyed by `(table_id, priority, match)` and
//! is kept alive by an M:N set of source ids (`sb_to_flow`/`sb_flow_ref` in
//! the original); it is destroyed once its last source lets go of it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::flow::{Flow, FlowKey, Match};
use crate::ids::{DesiredId, IdGen, InstalledId, SourceId};
use crate::ratelimit::RateLimiter;

pub(crate) struct DesiredEntry {
    pub(crate) flow: Flow,
    pub(crate) sources: Vec<SourceId>,
    pub(crate) installed: Option<InstalledId>,
}

#[derive(Default)]
struct SourceEntry {
    flows: Vec<DesiredId>,
}

/// Owned by the caller (one per logical bridge) and passed by reference into
/// every engine call that needs it; the engine never retains it between
/// calls.
pub struct DesiredFlowTable {
    by_key: HashMap<FlowKey, DesiredId>,
    entries: HashMap<DesiredId, DesiredEntry>,
    sources: HashMap<SourceId, SourceEntry>,
    ids: IdGen,
    dup_log_limiter: RateLimiter,
}

impl Default for DesiredFlowTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DesiredFlowTable {
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            entries: HashMap::new(),
            sources: HashMap::new(),
            ids: IdGen::default(),
            // VLOG_RATE_LIMIT_INIT(5, 5) in the original: 5 tokens, refilled
            // at a rate that allows 5 more per reporting window.
            dup_log_limiter: RateLimiter::new(5, 5),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn link_source(&mut self, source: SourceId, id: DesiredId) {
        self.sources.entry(source).or_default().flows.push(id);
    }

    /// Adds `flow` if no desired flow already exists with the same key
    /// *and* the same source attached to it; otherwise a duplicate is
    /// dropped (optionally logged at debug level, rate-limited).
    ///
    /// If a flow with the same key already exists under a *different*
    /// source, `source` is simply linked onto the existing entry — this is
    /// how two logical sources sharing one physical flow (e.g. two logical
    /// flows compiling to the same conjunctive match) collapse into a
    /// single switch-side flow.
    pub fn add(
        &mut self,
        table_id: u8,
        priority: u16,
        matc: Match,
        actions: Vec<u8>,
        cookie: u64,
        source: SourceId,
        log_duplicates: bool,
    ) {
        let key = FlowKey::new(table_id, priority, matc);
        if let Some(&existing_id) = self.by_key.get(&key) {
            let entry = self.entries.get_mut(&existing_id).unwrap();
            if entry.sources.contains(&source) {
                if log_duplicates && self.dup_log_limiter.allow() {
                    debug!(flow = %entry.flow, "dropping duplicate flow");
                }
                return;
            }
            entry.sources.push(source);
            self.link_source(source, existing_id);
            return;
        }

        let flow = Flow::new(table_id, priority, key.matc.clone(), actions, cookie);
        let id = self.ids.next(DesiredId::from_raw);
        debug!(flow = %flow, "add_flow");
        self.by_key.insert(key, id);
        self.entries.insert(
            id,
            DesiredEntry {
                flow,
                sources: vec![source],
                installed: None,
            },
        );
        self.link_source(source, id);
    }

    /// `check_and_add_flow` with duplicate logging forced on, matching
    /// `ofctrl_add_flow`'s call to `ofctrl_check_and_add_flow(..., true)`.
    pub fn add_flow(
        &mut self,
        table_id: u8,
        priority: u16,
        matc: Match,
        actions: Vec<u8>,
        cookie: u64,
        source: SourceId,
    ) {
        self.add(table_id, priority, matc, actions, cookie, source, true);
    }

    /// Either adds a new flow, or appends `actions` onto an existing flow
    /// sharing the same key, byte-concatenating the two action sequences
    /// (`actions = existing_actions ++ actions`). `source` is linked unless
    /// it is already among the existing flow's sources.
    pub fn add_or_append(
        &mut self,
        table_id: u8,
        priority: u16,
        matc: Match,
        actions: Vec<u8>,
        cookie: u64,
        source: SourceId,
    ) {
        let key = FlowKey::new(table_id, priority, matc);
        if let Some(&existing_id) = self.by_key.get(&key) {
            let entry = self.entries.get_mut(&existing_id).unwrap();
            entry.flow.actions.extend_from_slice(&actions);
            if !entry.sources.contains(&source) {
                entry.sources.push(source);
                self.link_source(source, existing_id);
            }
            debug!(flow = %entry.flow, "add_or_append_flow (append)");
            return;
        }

        let flow = Flow::new(table_id, priority, key.matc.clone(), actions, cookie);
        let id = self.ids.next(DesiredId::from_raw);
        debug!(flow = %flow, "add_or_append_flow (add)");
        self.by_key.insert(key, id);
        self.entries.insert(
            id,
            DesiredEntry {
                flow,
                sources: vec![source],
                installed: None,
            },
        );
        self.link_source(source, id);
    }

    /// Detaches `source` from every flow it references; any flow left with
    /// no remaining source is destroyed. Its (former) installed back-link,
    /// if any, is cleared — the installed-side cleanup itself happens in
    /// the next `put()` pass, which treats an orphaned installed flow as
    /// "no longer desired".
    pub fn remove(&mut self, source: SourceId) {
        let Some(source_entry) = self.sources.remove(&source) else {
            return;
        };
        for id in source_entry.flows {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            entry.sources.retain(|s| *s != source);
            if entry.sources.is_empty() {
                let entry = self.entries.remove(&id).unwrap();
                debug!(flow = %entry.flow, "remove_flows");
                self.by_key.remove(&entry.flow.key);
            }
        }
    }

    /// Transitive removal: removing `seeds` may orphan flows that other,
    /// not-yet-visited sources also reference exclusively among themselves
    /// (a conjunction torn down alongside every logical flow that only
    /// exists to feed it). Returns the full set of source ids that ended up
    /// removed, including `seeds` and every source transitively pulled in.
    pub fn flood_remove(&mut self, seeds: impl IntoIterator<Item = SourceId>) -> HashSet<SourceId> {
        let mut removed = HashSet::new();
        let mut worklist: Vec<SourceId> = seeds.into_iter().collect();

        while let Some(source) = worklist.pop() {
            if !removed.insert(source) {
                continue;
            }
            let Some(source_entry) = self.sources.remove(&source) else {
                continue;
            };
            for id in source_entry.flows {
                let Some(entry) = self.entries.get_mut(&id) else {
                    continue;
                };
                entry.sources.retain(|s| *s != source);
                if entry.sources.is_empty() {
                    let entry = self.entries.remove(&id).unwrap();
                    debug!(flow = %entry.flow, "flood remove");
                    self.by_key.remove(&entry.flow.key);
                } else {
                    // Other sources still reference this flow; queue them so
                    // their own exclusive flows get torn down too.
                    for &other in &entry.sources {
                        if !removed.contains(&other) {
                            worklist.push(other);
                        }
                    }
                }
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
        self.entries.clear();
        self.sources.clear();
    }

    pub(crate) fn lookup_by_key(&self, key: &FlowKey) -> Option<DesiredId> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn get(&self, id: DesiredId) -> Option<&DesiredEntry> {
        self.entries.get(&id)
    }

    pub(crate) fn set_installed(&mut self, id: DesiredId, installed: Option<InstalledId>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.installed = installed;
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (DesiredId, &DesiredEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn uid() -> SourceId {
        Uuid::new_v4()
    }

    #[test]
    fn duplicate_add_from_same_source_is_dropped() {
        let mut t = DesiredFlowTable::new();
        let src = uid();
        t.add_flow(0, 100, Match::new(), vec![1], 0, src);
        t.add_flow(0, 100, Match::new(), vec![1], 0, src);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn two_sources_sharing_a_key_collapse_to_one_flow() {
        let mut t = DesiredFlowTable::new();
        let (s1, s2) = (uid(), uid());
        t.add_flow(0, 100, Match::new(), vec![1], 0, s1);
        t.add_flow(0, 100, Match::new(), vec![1], 0, s2);
        assert_eq!(t.len(), 1);

        t.remove(s1);
        assert_eq!(t.len(), 1, "flow survives while s2 still references it");
        t.remove(s2);
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn add_or_append_concatenates_actions() {
        let mut t = DesiredFlowTable::new();
        let (s1, s2) = (uid(), uid());
        t.add_or_append(0, 100, Match::new(), vec![1, 2], 0, s1);
        t.add_or_append(0, 100, Match::new(), vec![3, 4], 0, s2);
        assert_eq!(t.len(), 1);
        let (_, entry) = t.iter().next().unwrap();
        assert_eq!(entry.flow.actions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn add_or_append_from_same_source_twice_does_not_duplicate_the_link() {
        let mut t = DesiredFlowTable::new();
        let src = uid();
        t.add_or_append(0, 100, Match::new(), vec![1, 2], 0, src);
        t.add_or_append(0, 100, Match::new(), vec![3, 4], 0, src);
        assert_eq!(t.len(), 1);
        let (id, entry) = t.iter().next().unwrap();
        assert_eq!(entry.sources, vec![src]);
        assert_eq!(entry.flow.actions, vec![1, 2, 3, 4], "actions still append both times");
        assert_eq!(t.sources.get(&src).unwrap().flows, vec![id]);
    }

    #[test]
    fn flood_remove_cascades_through_shared_flows() {
        let mut t = DesiredFlowTable::new();
        let (s1, s2) = (uid(), uid());
        // s1 alone owns flow A; s1 and s2 together own flow B (a shared
        // conjunction); s2 alone owns flow C.
        let mut m_a = Match::new();
        m_a.set_reg(0, 1, u32::MAX);
        let mut m_b = Match::new();
        m_b.set_reg(0, 2, u32::MAX);
        let mut m_c = Match::new();
        m_c.set_reg(0, 3, u32::MAX);

        t.add_flow(0, 100, m_a, vec![1], 0, s1);
        t.add_flow(0, 100, m_b.clone(), vec![2], 0, s1);
        t.add_flow(0, 100, m_b, vec![2], 0, s2);
        t.add_flow(0, 100, m_c, vec![3], 0, s2);
        assert_eq!(t.len(), 3);

        let removed = t.flood_remove([s1]);
        assert!(removed.contains(&s1));
        assert!(removed.contains(&s2), "s2 pulled in transitively via B");
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn r1_add_then_remove_empties_the_table() {
        let mut t = DesiredFlowTable::new();
        let s = uid();
        t.add_flow(0, 100, Match::new(), vec![1, 2, 3], 0, s);
        assert_eq!(t.len(), 1);
        t.remove(s);
        assert_eq!(t.len(), 0);
        assert!(t.lookup_by_key(&FlowKey::new(0, 100, Match::new())).is_none());
    }
}

/// Invariant/property fuzzing for P1-P3 and P6 (spec.md §8). A small
/// reference model (a bipartite source/key edge set) is kept alongside the
/// real table and checked for agreement after every operation, rather than
/// round-tripping through the table's own algorithms a second time.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    const N_SOURCES: usize = 4;
    const N_KEYS: usize = 4;

    fn source_id(i: usize) -> SourceId {
        Uuid::from_u128(i as u128 + 1)
    }

    fn key_for(i: usize) -> FlowKey {
        FlowKey::new(i as u8, 100, Match::new())
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize, usize),
        AddOrAppend(usize, usize),
        Remove(usize),
        FloodRemove(Vec<usize>),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..N_SOURCES, 0..N_KEYS).prop_map(|(s, k)| Op::Add(s, k)),
            (0..N_SOURCES, 0..N_KEYS).prop_map(|(s, k)| Op::AddOrAppend(s, k)),
            (0..N_SOURCES).prop_map(Op::Remove),
            prop::collection::vec(0..N_SOURCES, 0..N_SOURCES).prop_map(Op::FloodRemove),
        ]
    }

    /// Checks I1-I3: every entry reachable from `by_key` exactly once, from
    /// every one of its sources' index lists exactly once, and no entry has
    /// an empty source list.
    fn assert_structural_invariants(t: &DesiredFlowTable) {
        for (&key, &id) in &t.by_key {
            let entry = t.entries.get(&id).expect("by_key points at a live entry");
            assert_eq!(entry.flow.key, key, "by_key key matches entry's own key");
        }
        for (&id, entry) in &t.entries {
            assert!(!entry.sources.is_empty(), "I3: no entry has an empty source list");
            assert_eq!(t.by_key.get(&entry.flow.key), Some(&id), "I1");
            for source in &entry.sources {
                let links = &t.sources.get(source).expect("source entry exists").flows;
                let occurrences = links.iter().filter(|&&d| d == id).count();
                assert_eq!(occurrences, 1, "I2: exactly one link per source per flow");
            }
        }
        for (source, source_entry) in &t.sources {
            for &id in &source_entry.flows {
                let entry = t.entries.get(&id).expect("source entry points at a live flow");
                assert!(entry.sources.contains(source));
            }
        }
    }

    /// Reference model: which sources (by index) currently reference each
    /// key (by index), mirroring the union-on-shared-key semantics of both
    /// `add` and `add_or_append` (they differ only in how actions combine,
    /// which these invariants don't depend on).
    fn apply_ref(model: &mut [BTreeSet<usize>; N_KEYS], op: &Op) -> Option<BTreeSet<usize>> {
        match *op {
            Op::Add(s, k) | Op::AddOrAppend(s, k) => {
                model[k].insert(s);
                None
            }
            Op::Remove(s) => {
                for key_sources in model.iter_mut() {
                    key_sources.remove(&s);
                }
                None
            }
            Op::FloodRemove(ref seeds) => {
                // Union-find over sources that share a key. No path
                // compression, so `find` can stay a plain immutable lookup.
                fn find(parent: &[usize; N_SOURCES], x: usize) -> usize {
                    let mut root = x;
                    while parent[root] != root {
                        root = parent[root];
                    }
                    root
                }

                let mut parent: [usize; N_SOURCES] = std::array::from_fn(|i| i);
                for key_sources in model.iter() {
                    let mut iter = key_sources.iter();
                    if let Some(&first) = iter.next() {
                        for &other in iter {
                            let (ra, rb) = (find(&parent, first), find(&parent, other));
                            if ra != rb {
                                parent[ra] = rb;
                            }
                        }
                    }
                }

                let closure_roots: BTreeSet<usize> =
                    seeds.iter().map(|&s| find(&parent, s)).collect();
                let in_closure: Vec<bool> = (0..N_SOURCES)
                    .map(|s| closure_roots.contains(&find(&parent, s)))
                    .collect();

                for key_sources in model.iter_mut() {
                    if key_sources.iter().any(|&s| in_closure[s]) {
                        key_sources.clear();
                    }
                }

                let mut processed: BTreeSet<usize> =
                    (0..N_SOURCES).filter(|&s| in_closure[s]).collect();
                processed.extend(seeds.iter().copied());
                Some(processed)
            }
        }
    }

    proptest! {
        #[test]
        fn invariants_hold_under_arbitrary_op_sequences(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut t = DesiredFlowTable::new();
            let mut model: [BTreeSet<usize>; N_KEYS] = std::array::from_fn(|_| BTreeSet::new());

            for op in &ops {
                match op {
                    Op::Add(s, k) => t.add_flow(*k as u8, 100, Match::new(), vec![1], 0, source_id(*s)),
                    Op::AddOrAppend(s, k) => {
                        t.add_or_append(*k as u8, 100, Match::new(), vec![2], 0, source_id(*s))
                    }
                    Op::Remove(s) => t.remove(source_id(*s)),
                    Op::FloodRemove(seeds) => {
                        let removed = t.flood_remove(seeds.iter().map(|&s| source_id(s)));
                        if let Some(expected) = apply_ref(&mut model, op) {
                            let actual: BTreeSet<usize> = removed
                                .iter()
                                .map(|src| {
                                    (0..N_SOURCES)
                                        .find(|&i| source_id(i) == *src)
                                        .expect("flood_remove only returns known sources")
                                })
                                .collect();
                            prop_assert_eq!(actual, expected, "P3: processed-sources set matches the shared-flow closure");
                        }
                        assert_structural_invariants(&t);
                        continue;
                    }
                }
                apply_ref(&mut model, op);
                assert_structural_invariants(&t);
            }

            // P1-P3: the table's final shape matches the reference model —
            // a key has a live desired flow iff the model still has sources
            // for it, and its source set matches exactly.
            for k in 0..N_KEYS {
                let live = t.lookup_by_key(&key_for(k));
                if model[k].is_empty() {
                    prop_assert!(live.is_none());
                } else {
                    let id = live.expect("model has sources but table has no entry");
                    let entry = t.get(id).unwrap();
                    let actual: BTreeSet<usize> = entry
                        .sources
                        .iter()
                        .map(|src| {
                            (0..N_SOURCES)
                                .find(|&i| source_id(i) == *src)
                                .expect("source id maps back to its index")
                        })
                        .collect();
                    prop_assert_eq!(actual, model[k].clone());
                }
            }
        }

        #[test]
        fn p6_add_then_add_or_append_concatenates_from_distinct_sources(
            a in prop::collection::vec(any::<u8>(), 0..8),
            b in prop::collection::vec(any::<u8>(), 0..8),
        ) {
            let mut t = DesiredFlowTable::new();
            let (s1, s2) = (source_id(0), source_id(1));
            t.add(0, 100, Match::new(), a.clone(), 0, s1, true);
            t.add_or_append(0, 100, Match::new(), b.clone(), 0, s2);

            prop_assert_eq!(t.len(), 1);
            let (_, entry) = t.iter().next().unwrap();
            let mut expected = a;
            expected.extend_from_slice(&b);
            prop_assert_eq!(entry.flow.actions.clone(), expected);
            let mut sources: Vec<SourceId> = entry.sources.clone();
            sources.sort();
            let mut wanted = vec![s1, s2];
            wanted.sort();
            prop_assert_eq!(sources, wanted);
        }
    }
}
