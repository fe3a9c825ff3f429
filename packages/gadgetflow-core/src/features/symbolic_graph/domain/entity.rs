//! Symbolic heap entities

use super::taint::TaintId;
use crate::shared::models::{CallStack, FieldKey, MethodSignature};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

/// Stable handle to an entity in a `SymbolicGraph` arena.
///
/// Handles survive merges: a merged-away entity forwards to its survivor,
/// so holders never observe a dangling id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Where an entity came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntitySource {
    Constant,
    Argument(u16),
    Static,
    MethodReturn(MethodSignature),
    /// Allocated by `newobj` of the given type
    Constructed(String),
    Uninitialized,
    Array,
    /// Lazily created on first load of a field
    UnknownField(FieldKey),
}

/// Call to an attack-trigger candidate recorded on an input parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCall {
    pub signature: MethodSignature,
    /// Stack of the method performing the call
    pub call_stack: CallStack,
}

impl TargetCall {
    pub fn same_call(&self, other: &TargetCall) -> bool {
        self.signature == other.signature && self.call_stack.same_frames(&other.call_stack)
    }
}

/// Sink invocation deferred until one of its inputs becomes input-tainted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkCall {
    pub signature: MethodSignature,
    pub call_stack: CallStack,
    pub offset: u32,
}

/// Deferred taint edge: when the owner becomes input, `target` gets a fresh
/// source id for `sink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleTaint {
    pub target: EntityId,
    pub sink: SinkCall,
}

#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub source: Option<EntitySource>,
    pub(crate) fields: FxHashMap<FieldKey, EntityId>,
    /// Back-references: parent -> field names under which it reaches `self`
    pub(crate) parents: FxHashMap<EntityId, FxHashSet<FieldKey>>,
    pub(crate) taint: TaintId,
    /// Every descendant (present and future) is input
    pub(crate) deep_input: bool,
    pub(crate) taint_stack: Option<CallStack>,
    pub(crate) target_calls: Vec<TargetCall>,
    pub(crate) possible_input: FxHashSet<EntityId>,
    pub(crate) possible_tainted: Vec<PossibleTaint>,
}

impl Entity {
    pub fn new(source: Option<EntitySource>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    #[inline]
    pub fn taint(&self) -> TaintId {
        self.taint
    }

    #[inline]
    pub fn is_deep_input(&self) -> bool {
        self.deep_input
    }

    pub fn taint_stack(&self) -> Option<&CallStack> {
        self.taint_stack.as_ref()
    }

    pub fn field(&self, key: &FieldKey) -> Option<EntityId> {
        self.fields.get(key).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldKey, EntityId)> {
        self.fields.iter().map(|(k, v)| (k, *v))
    }

    /// Fields ordered by name
    pub fn sorted_fields(&self) -> Vec<(FieldKey, EntityId)> {
        let mut fields: Vec<(FieldKey, EntityId)> =
            self.fields.iter().map(|(k, v)| (k.clone(), *v)).collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn parents(&self) -> impl Iterator<Item = (EntityId, &FxHashSet<FieldKey>)> {
        self.parents.iter().map(|(p, keys)| (*p, keys))
    }

    pub fn target_calls(&self) -> &[TargetCall] {
        &self.target_calls
    }

    pub fn possible_input(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.possible_input.iter().copied()
    }

    pub fn possible_tainted(&self) -> &[PossibleTaint] {
        &self.possible_tainted
    }

    pub(crate) fn push_target_call(&mut self, call: TargetCall) -> bool {
        if self.target_calls.iter().any(|c| c.same_call(&call)) {
            return false;
        }
        self.target_calls.push(call);
        true
    }

    pub(crate) fn push_possible_tainted(&mut self, edge: PossibleTaint) {
        if !self.possible_tainted.contains(&edge) {
            self.possible_tainted.push(edge);
        }
    }
}
