//! Provenance rebasing for summary application
//!
//! A cached summary records call stacks relative to the activation that
//! produced it. Applying it at another call site rewrites the stack prefix
//! and re-identifies taint ids whose forward path changed.

use crate::features::analysis_result::DataFlowAnalysisResult;
use crate::features::symbolic_graph::{ApplyHooks, TaintId};
use crate::shared::models::{CallStack, SummaryKey};
use rustc_hash::FxHashMap;

pub(crate) struct ProvenanceHooks<'r> {
    result: &'r mut DataFlowAnalysisResult,
    /// Depth of the summary's own stack
    callee_depth: usize,
    /// Caller stack with the callee key pushed
    base: CallStack,
    caller: SummaryKey,
    /// Raw callee id -> caller id, per application
    remapped: FxHashMap<TaintId, TaintId>,
}

impl<'r> ProvenanceHooks<'r> {
    pub fn new(
        result: &'r mut DataFlowAnalysisResult,
        callee_depth: usize,
        base: CallStack,
        caller: SummaryKey,
    ) -> Self {
        Self {
            result,
            callee_depth,
            base,
            caller,
            remapped: FxHashMap::default(),
        }
    }
}

impl ApplyHooks for ProvenanceHooks<'_> {
    fn rebase_taint(&mut self, taint: TaintId) -> TaintId {
        if let Some(mapped) = self.remapped.get(&taint) {
            return *mapped;
        }

        let current = self.result.resolve(taint);
        let forward = self
            .result
            .source(current)
            .map(|info| info.forward_stack.clone());
        let mapped = match forward {
            Some(forward) => {
                let rebased = forward.rebase(self.callee_depth, &self.base);
                if rebased.same_frames(&forward) {
                    current
                } else {
                    self.result.update_tainted_method(current, rebased)
                }
            }
            None => current,
        };

        self.result.observe(mapped, self.caller.clone());
        self.remapped.insert(taint, mapped);
        mapped
    }

    fn rebase_stack(&mut self, stack: &CallStack) -> CallStack {
        stack.rebase(self.callee_depth, &self.base)
    }
}
