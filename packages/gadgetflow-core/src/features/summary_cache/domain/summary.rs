//! Method summaries

use crate::features::execution_env::FrozenContext;
use crate::features::symbolic_graph::{EntityId, SymbolicGraph};
use crate::shared::models::CallStack;

/// Immutable result of analyzing one method (or one virtual dispatch)
#[derive(Debug, Clone)]
pub struct MethodSummary {
    pub graph: SymbolicGraph,
    pub static_entity: Option<EntityId>,
    /// One per formal, `this` first; `None` for simple-typed formals
    pub arguments: Vec<Option<EntityId>>,
    pub return_entity: Option<EntityId>,
    pub method_call_count: u32,
    pub instruction_count: u32,
    /// Stack of the activation that produced the summary (own key on top).
    /// Provenance recorded in `graph` is relative to it.
    pub stack: CallStack,
}

impl MethodSummary {
    /// Root entities in apply order: static root, formals, return value
    pub fn roots(&self) -> Vec<Option<EntityId>> {
        let mut roots = Vec::with_capacity(self.arguments.len() + 2);
        roots.push(self.static_entity);
        roots.extend(self.arguments.iter().copied());
        roots.push(self.return_entity);
        roots
    }
}

#[derive(Debug, Clone)]
pub enum Summary {
    /// No effect. Answers a recursive call before its head is summarized.
    Empty,
    Computed(MethodSummary),
}

impl Summary {
    pub fn from_frozen(frozen: FrozenContext, stack: CallStack) -> Self {
        Summary::Computed(MethodSummary {
            graph: frozen.graph,
            static_entity: frozen.static_entity,
            arguments: frozen.arguments,
            return_entity: frozen.return_entity,
            method_call_count: frozen.method_call_count,
            instruction_count: frozen.instruction_count,
            stack,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Summary::Empty)
    }

    pub fn as_computed(&self) -> Option<&MethodSummary> {
        match self {
            Summary::Computed(summary) => Some(summary),
            Summary::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::execution_env::ExecutionContext;
    use crate::shared::models::{MethodRef, MethodSignature, SummaryKey, TypeRef};

    #[test]
    fn test_summary_from_frozen_context() {
        let m = MethodRef::new(
            TypeRef::new("Test.A"),
            "M",
            vec![TypeRef::object(), TypeRef::value_type("System.Int32")],
            TypeRef::void(),
            true,
        );
        let ctx = ExecutionContext::new(&m, &[], true);
        let stack = CallStack::new().push(SummaryKey::concrete(&MethodSignature::new("X")));
        let summary = Summary::from_frozen(ctx.freeze(), stack);

        let computed = summary.as_computed().unwrap();
        assert_eq!(computed.arguments.len(), 3);
        assert!(computed.arguments[2].is_none());
        assert_eq!(computed.roots().len(), 5);
        assert_eq!(computed.stack.depth(), 1);
        assert!(!summary.is_empty());
        assert!(Summary::Empty.as_computed().is_none());
    }
}
