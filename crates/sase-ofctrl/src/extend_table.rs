//! Group and meter tables: OpenFlow tables where the engine, rather than
//! enumerating individual entries the way it does for flows, grows and
//! shrinks a shared id space on demand. Grounded on `ovn_extend_table` in
//! the original, which tracks a `desired` set (keyed by name, assigned an
//! id lazily) and an `existing` set the switch actually has, synced at the
//! end of each `put()` pass.

use crate::ids::SourceId;

/// One entry in an extend table: an allocated numeric id (group id / meter
/// id) and the collaborator-defined spec describing its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendEntry {
    pub table_id: u32,
    pub name: String,
}

/// The collaborator contract `put()` drives groups and meters through.
/// Implementors own the id-allocation and desired/existing bookkeeping;
/// `put()` only needs to iterate what's pending and report what got
/// removed from the desired side.
pub trait ExtendTable {
    /// Entries present in the desired set but not yet installed.
    fn uninstalled(&self) -> Vec<ExtendEntry>;

    /// Entries present in the existing (installed) set but no longer
    /// desired.
    fn installed_only(&self) -> Vec<ExtendEntry>;

    /// Detaches every desired entry that exists only because of `source`
    /// (mirrors `ovn_extend_table_remove_desired`).
    fn remove_desired(&mut self, source: SourceId);

    /// Drops `table_id` from the existing set once `put()` has sent the
    /// delete for it.
    fn remove_existing(&mut self, table_id: u32);

    /// Clears both desired and existing sets, e.g. on reconnect
    /// (`ovn_extend_table_clear`).
    fn clear(&mut self);

    /// Copies the desired set onto the existing set once `put()` has sent
    /// adds for everything newly uninstalled (`ovn_extend_table_sync`).
    fn sync(&mut self);
}

/// A straightforward in-memory `ExtendTable`, suitable both for tests and
/// as a default for embedders that don't need anything fancier than
/// "allocate the next free id for a new name".
#[derive(Default)]
pub struct InMemoryExtendTable {
    next_id: u32,
    desired: Vec<(SourceId, ExtendEntry)>,
    existing: Vec<ExtendEntry>,
}

impl InMemoryExtendTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates (or reuses, if `name` is already desired) an id for `name`
    /// on behalf of `source`.
    pub fn ensure(&mut self, name: &str, source: SourceId) -> u32 {
        if let Some((_, entry)) = self.desired.iter().find(|(_, e)| e.name == name) {
            return entry.table_id;
        }
        self.next_id += 1;
        let table_id = self.next_id;
        self.desired.push((
            source,
            ExtendEntry {
                table_id,
                name: name.to_string(),
            },
        ));
        table_id
    }
}

impl ExtendTable for InMemoryExtendTable {
    fn uninstalled(&self) -> Vec<ExtendEntry> {
        self.desired
            .iter()
            .map(|(_, e)| e.clone())
            .filter(|e| !self.existing.iter().any(|x| x.table_id == e.table_id))
            .collect()
    }

    fn installed_only(&self) -> Vec<ExtendEntry> {
        self.existing
            .iter()
            .filter(|e| !self.desired.iter().any(|(_, d)| d.table_id == e.table_id))
            .cloned()
            .collect()
    }

    fn remove_desired(&mut self, source: SourceId) {
        self.desired.retain(|(s, _)| *s != source);
    }

    fn remove_existing(&mut self, table_id: u32) {
        self.existing.retain(|e| e.table_id != table_id);
    }

    fn clear(&mut self) {
        self.desired.clear();
        self.existing.clear();
    }

    fn sync(&mut self) {
        self.existing = self.desired.iter().map(|(_, e)| e.clone()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn uninstalled_then_synced_becomes_installed_only_after_removal() {
        let mut t = InMemoryExtendTable::new();
        let src = Uuid::new_v4();
        let id = t.ensure("grp-a", src);
        assert_eq!(t.uninstalled().len(), 1);
        t.sync();
        assert!(t.uninstalled().is_empty());

        t.remove_desired(src);
        assert_eq!(t.installed_only(), vec![ExtendEntry { table_id: id, name: "grp-a".into() }]);
    }
}
