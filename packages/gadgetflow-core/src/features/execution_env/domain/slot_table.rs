//! Keyed slot tables with union-on-store

use crate::features::symbolic_graph::{SlotArena, SlotId, SymbolicGraph};
use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Storing under an existing key unions with the previous value
/// ("the value here could be either").
#[derive(Debug, Clone)]
pub struct SlotTable<K> {
    entries: FxHashMap<K, SlotId>,
}

impl<K> Default for SlotTable<K> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash> SlotTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: K) -> Option<SlotId> {
        self.entries.get(&key).copied()
    }

    /// Bind without union (initial values)
    pub fn bind(&mut self, key: K, slot: SlotId) {
        self.entries.insert(key, slot);
    }

    pub fn store(
        &mut self,
        key: K,
        slot: SlotId,
        arena: &mut SlotArena,
        graph: &mut SymbolicGraph,
    ) -> SlotId {
        let stored = match self.entries.get(&key) {
            Some(existing) => arena.union(graph, *existing, slot),
            None => slot,
        };
        self.entries.insert(key, stored);
        stored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_graph::Slot;

    #[test]
    fn test_store_unions_existing() {
        let mut graph = SymbolicGraph::new();
        let mut arena = SlotArena::new();
        let mut table: SlotTable<u16> = SlotTable::new();
        let a = graph.create(None);
        let b = graph.create(None);

        let first = arena.entity(a);
        let second = arena.entity(b);
        table.store(0, first, &mut arena, &mut graph);
        let stored = table.store(0, second, &mut arena, &mut graph);

        assert_eq!(arena.get(stored), &Slot::Values(vec![a, b]));
        assert_eq!(table.get(0), Some(stored));
        assert_eq!(table.len(), 1);
    }
}
