//! Slot storage and normalization
//!
//! Slots are append-only; union allocates a new slot unless one side
//! carries nothing symbolic. After normalization a slot is either
//! materialized (`Values`) or pending (`Pending`), never both: mixing the
//! two forces the pending side to materialize.

use super::graph::SymbolicGraph;
use crate::features::symbolic_graph::domain::{EntityId, EntitySource, PendingLoad, Slot, SlotId};
use crate::shared::models::FieldKey;

#[derive(Debug, Clone, Default)]
pub struct SlotArena {
    slots: Vec<Slot>,
}

impl SlotArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn alloc(&mut self, slot: Slot) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(slot);
        id
    }

    #[inline]
    pub fn get(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    pub fn fake(&mut self) -> SlotId {
        self.alloc(Slot::Fake)
    }

    pub fn constant(&mut self) -> SlotId {
        self.alloc(Slot::Constant)
    }

    pub fn entity(&mut self, entity: EntityId) -> SlotId {
        self.alloc(Slot::Values(vec![entity]))
    }

    /// Pending load of `key` from whatever `base` holds
    pub fn load(&mut self, base: SlotId, key: FieldKey) -> SlotId {
        let slot = match self.get(base) {
            Slot::Fake | Slot::Constant => Slot::Fake,
            Slot::Values(_) => Slot::Pending(vec![PendingLoad {
                base,
                path: vec![key],
            }]),
            Slot::Pending(loads) => Slot::Pending(
                loads
                    .iter()
                    .map(|load| {
                        let mut path = load.path.clone();
                        path.push(key.clone());
                        PendingLoad {
                            base: load.base,
                            path,
                        }
                    })
                    .collect(),
            ),
        };
        self.alloc(slot)
    }

    /// "Either `a` or `b`"
    pub fn union(&mut self, graph: &mut SymbolicGraph, a: SlotId, b: SlotId) -> SlotId {
        if a == b {
            return a;
        }

        match (self.get(a), self.get(b)) {
            (Slot::Constant, Slot::Constant) | (Slot::Fake, Slot::Fake) => a,
            (Slot::Fake, Slot::Constant) | (Slot::Constant, Slot::Fake) => a,
            (Slot::Fake | Slot::Constant, _) => b,
            (_, Slot::Fake | Slot::Constant) => a,
            (Slot::Values(x), Slot::Values(y)) => {
                let mut values = x.clone();
                values.extend(y.iter().copied());
                let values = dedup_entities(graph, values);
                self.alloc(Slot::Values(values))
            }
            (Slot::Pending(x), Slot::Pending(y)) => {
                let mut loads = x.clone();
                for load in y {
                    if !loads.contains(load) {
                        loads.push(load.clone());
                    }
                }
                self.alloc(Slot::Pending(loads))
            }
            _ => {
                let mut values = self.materialize(graph, a);
                values.extend(self.materialize(graph, b));
                let values = dedup_entities(graph, values);
                self.alloc(Slot::Values(values))
            }
        }
    }

    /// Concrete entities of a slot; pending loads are resolved and memoized
    pub fn materialize(&mut self, graph: &mut SymbolicGraph, id: SlotId) -> Vec<EntityId> {
        let loads = match self.get(id) {
            Slot::Fake | Slot::Constant => return Vec::new(),
            Slot::Values(values) => {
                let values = values.clone();
                return dedup_entities(graph, values);
            }
            Slot::Pending(loads) => loads.clone(),
        };

        let mut values = Vec::new();
        for load in loads {
            for base in self.materialize(graph, load.base) {
                let mut current = base;
                for key in &load.path {
                    current = graph.load_field(current, key.clone());
                }
                values.push(current);
            }
        }

        let values = dedup_entities(graph, values);
        self.slots[id.index()] = Slot::Values(values.clone());
        values
    }

    /// Single entity for a slot, merging a multi-valued union
    pub fn materialize_single(&mut self, graph: &mut SymbolicGraph, id: SlotId) -> Option<EntityId> {
        let values = self.materialize(graph, id);
        let (first, rest) = values.split_first()?;
        let merged = rest
            .iter()
            .fold(*first, |acc, other| graph.merge(acc, *other));
        if !rest.is_empty() {
            self.slots[id.index()] = Slot::Values(vec![merged]);
        }
        Some(merged)
    }

    /// Like `materialize_single`, but an opaque slot gets a fresh entity
    pub fn materialize_or_create(
        &mut self,
        graph: &mut SymbolicGraph,
        id: SlotId,
        source: EntitySource,
    ) -> EntityId {
        if let Some(entity) = self.materialize_single(graph, id) {
            return entity;
        }
        let entity = graph.create(Some(source));
        self.slots[id.index()] = Slot::Values(vec![entity]);
        entity
    }
}

fn dedup_entities(graph: &SymbolicGraph, values: Vec<EntityId>) -> Vec<EntityId> {
    let mut out: Vec<EntityId> = Vec::with_capacity(values.len());
    for value in values {
        let value = graph.find(value);
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
