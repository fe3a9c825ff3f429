//! Argument, local and static contexts

use crate::features::execution_env::domain::{is_simple_type, SlotTable};
use crate::features::symbolic_graph::{EntityId, EntitySource, SlotArena, SlotId, SymbolicGraph};
use crate::shared::models::{FieldKey, MethodRef, TypeRef};

/// Formal arguments (`this` first for instance methods).
///
/// Each non-simple formal gets an entity up front; these entities are what
/// the summary exposes to callers. `starg` never merges into the formal.
/// On straight-line code it replaces the binding; elsewhere the slot holds
/// both values, since either may reach later loads.
#[derive(Debug, Clone)]
pub struct ArgumentContext {
    table: SlotTable<u16>,
    formals: Vec<Option<EntityId>>,
    types: Vec<TypeRef>,
}

impl ArgumentContext {
    pub fn new(method: &MethodRef, graph: &mut SymbolicGraph, arena: &mut SlotArena) -> Self {
        let types = method.formal_types();
        let mut table = SlotTable::new();
        let mut formals = Vec::with_capacity(types.len());

        for (index, ty) in types.iter().enumerate() {
            let index = index as u16;
            if is_simple_type(ty) {
                formals.push(None);
                table.bind(index, arena.fake());
            } else {
                let entity = graph.create(Some(EntitySource::Argument(index)));
                formals.push(Some(entity));
                table.bind(index, arena.entity(entity));
            }
        }

        Self {
            table,
            formals,
            types,
        }
    }

    pub fn load(&self, index: u16) -> Option<SlotId> {
        self.table.get(index)
    }

    pub fn store(
        &mut self,
        index: u16,
        slot: SlotId,
        arena: &mut SlotArena,
        graph: &mut SymbolicGraph,
    ) {
        self.table.store(index, slot, arena, graph);
    }

    /// Replace the binding outright (strong update)
    pub fn rebind(&mut self, index: u16, slot: SlotId) {
        self.table.bind(index, slot);
    }

    pub fn formal(&self, index: usize) -> Option<EntityId> {
        self.formals.get(index).copied().flatten()
    }

    pub fn formals(&self) -> &[Option<EntityId>] {
        &self.formals
    }

    pub fn type_of(&self, index: u16) -> Option<&TypeRef> {
        self.types.get(index as usize)
    }

    pub fn count(&self) -> usize {
        self.formals.len()
    }
}

/// Method locals
#[derive(Debug, Clone)]
pub struct VariableContext {
    table: SlotTable<u16>,
    types: Vec<TypeRef>,
}

impl VariableContext {
    pub fn new(locals: &[TypeRef]) -> Self {
        Self {
            table: SlotTable::new(),
            types: locals.to_vec(),
        }
    }

    pub fn is_simple(&self, index: u16) -> bool {
        self.types
            .get(index as usize)
            .is_some_and(is_simple_type)
    }

    /// Current value; an unassigned local reads as its default
    pub fn load(&self, index: u16, arena: &mut SlotArena) -> SlotId {
        match self.table.get(index) {
            Some(slot) => slot,
            None if self.is_simple(index) => arena.fake(),
            None => arena.constant(),
        }
    }

    pub fn store(
        &mut self,
        index: u16,
        slot: SlotId,
        arena: &mut SlotArena,
        graph: &mut SymbolicGraph,
    ) {
        self.table.store(index, slot, arena, graph);
    }

    /// Entity behind `ldloca`, created on first use
    pub fn address(
        &mut self,
        index: u16,
        arena: &mut SlotArena,
        graph: &mut SymbolicGraph,
    ) -> EntityId {
        let slot = match self.table.get(index) {
            Some(slot) => slot,
            None => {
                let slot = arena.constant();
                self.table.bind(index, slot);
                slot
            }
        };
        arena.materialize_or_create(graph, slot, EntitySource::Uninitialized)
    }
}

/// Static fields, modeled as fields of one root entity per activation
#[derive(Debug, Clone)]
pub struct StaticContext {
    root: Option<EntityId>,
}

impl StaticContext {
    pub fn new(enabled: bool, graph: &mut SymbolicGraph) -> Self {
        let root = enabled.then(|| graph.create(Some(EntitySource::Static)));
        Self { root }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<EntityId> {
        self.root
    }

    /// Static field value. With statics disabled every load is a fresh,
    /// unconnected entity.
    pub fn load(&self, key: FieldKey, graph: &mut SymbolicGraph) -> EntityId {
        match self.root {
            Some(root) => graph.load_field(root, key),
            None => graph.create(Some(EntitySource::Static)),
        }
    }

    /// Written to the graph immediately; ignored with statics disabled
    pub fn store(&self, key: FieldKey, value: EntityId, graph: &mut SymbolicGraph) {
        if let Some(root) = self.root {
            graph.store_field(root, key, value);
        }
    }
}
