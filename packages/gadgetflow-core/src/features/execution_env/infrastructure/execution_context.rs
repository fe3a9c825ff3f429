//! Per-activation execution context

use super::contexts::{ArgumentContext, StaticContext, VariableContext};
use crate::features::execution_env::domain::is_simple_type;
use crate::features::symbolic_graph::{EntityId, EntitySource, SlotArena, SlotId, SymbolicGraph};
use crate::shared::models::{MethodRef, TypeRef};

/// Mutable state of one method activation. Lives for exactly one analysis
/// and is consumed by [`ExecutionContext::freeze`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub graph: SymbolicGraph,
    pub slots: SlotArena,
    pub arguments: ArgumentContext,
    pub variables: VariableContext,
    pub statics: StaticContext,
    return_slot: Option<SlotId>,
    method_call_count: u32,
    instruction_count: u32,
}

/// What survives an activation
#[derive(Debug, Clone)]
pub struct FrozenContext {
    pub graph: SymbolicGraph,
    pub static_entity: Option<EntityId>,
    pub arguments: Vec<Option<EntityId>>,
    pub return_entity: Option<EntityId>,
    pub method_call_count: u32,
    pub instruction_count: u32,
}

impl ExecutionContext {
    pub fn new(method: &MethodRef, locals: &[TypeRef], enable_static_fields: bool) -> Self {
        let mut graph = SymbolicGraph::new();
        let mut slots = SlotArena::new();
        let statics = StaticContext::new(enable_static_fields, &mut graph);
        let arguments = ArgumentContext::new(method, &mut graph, &mut slots);

        Self {
            graph,
            slots,
            arguments,
            variables: VariableContext::new(locals),
            statics,
            return_slot: None,
            method_call_count: 0,
            instruction_count: 0,
        }
    }

    /// Context of a virtual dispatch stub: formals plus one return entity
    /// that every implementation's return value is matched against.
    pub fn for_dispatch(method: &MethodRef, enable_static_fields: bool) -> Self {
        let mut ctx = Self::new(method, &[], enable_static_fields);
        if method.returns_value() && !is_simple_type(&method.return_type) {
            let entity = ctx.graph.create(Some(EntitySource::MethodReturn(method.signature())));
            ctx.return_slot = Some(ctx.slots.entity(entity));
        }
        ctx
    }

    /// Candidate return value (unioned across `ret` sites)
    pub fn record_return(&mut self, slot: SlotId) {
        let merged = match self.return_slot {
            Some(existing) => self.slots.union(&mut self.graph, existing, slot),
            None => slot,
        };
        self.return_slot = Some(merged);
    }

    pub fn return_entity(&mut self) -> Option<EntityId> {
        let slot = self.return_slot?;
        self.slots.materialize_single(&mut self.graph, slot)
    }

    #[inline]
    pub fn count_instruction(&mut self) {
        self.instruction_count += 1;
    }

    #[inline]
    pub fn count_method_call(&mut self) {
        self.method_call_count += 1;
    }

    /// Add a callee's counters (replace-mode application)
    pub fn add_counts(&mut self, method_calls: u32, instructions: u32) {
        self.method_call_count = self.method_call_count.saturating_add(method_calls);
        self.instruction_count = self.instruction_count.saturating_add(instructions);
    }

    /// Keep the larger counters (merge-mode application)
    pub fn max_counts(&mut self, method_calls: u32, instructions: u32) {
        self.method_call_count = self.method_call_count.max(method_calls);
        self.instruction_count = self.instruction_count.max(instructions);
    }

    pub fn method_call_count(&self) -> u32 {
        self.method_call_count
    }

    pub fn instruction_count(&self) -> u32 {
        self.instruction_count
    }

    pub fn freeze(mut self) -> FrozenContext {
        let return_entity = self.return_entity();
        let graph = self.graph;
        let arguments = self
            .arguments
            .formals()
            .iter()
            .map(|f| f.map(|e| graph.find(e)))
            .collect();
        let static_entity = self.statics.root().map(|e| graph.find(e));

        FrozenContext {
            return_entity: return_entity.map(|e| graph.find(e)),
            static_entity,
            arguments,
            method_call_count: self.method_call_count,
            instruction_count: self.instruction_count,
            graph,
        }
    }
}
