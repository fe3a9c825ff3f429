//! Per-taint-instance bookkeeping

use crate::features::analysis_result::domain::patterns::is_high_priority;
use crate::features::symbolic_graph::TaintId;
use crate::shared::models::{CallStack, MethodSignature, SummaryKey};
use serde::Serialize;

/// A tainted value reaching a method without an available body
#[derive(Debug, Clone, Serialize)]
pub struct AttackTrigger {
    pub signature: MethodSignature,
    /// Stack of the method performing the call
    pub call_stack: CallStack,
}

impl AttackTrigger {
    /// Number of frames from the entry point down to the trigger call
    /// itself (the entry point counts as 1)
    pub fn call_depth(&self) -> usize {
        self.call_stack.depth() + 1
    }

    pub fn is_high_priority(&self) -> bool {
        is_high_priority(&self.signature)
    }

    fn same_call(&self, other: &AttackTrigger) -> bool {
        self.signature == other.signature && self.call_stack.same_frames(&other.call_stack)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaintedSourceInfo {
    pub id: TaintId,
    /// Method that called the sensitive sink
    pub method: MethodSignature,
    /// Entry point down to `method`
    pub forward_stack: CallStack,
    /// Callers the tainted value was returned into, innermost first
    pub backward_stack: Vec<SummaryKey>,
    pub attack_triggers: Vec<AttackTrigger>,
}

impl TaintedSourceInfo {
    pub fn new(id: TaintId, method: MethodSignature, forward_stack: CallStack) -> Self {
        Self {
            id,
            method,
            forward_stack,
            backward_stack: Vec::new(),
            attack_triggers: Vec::new(),
        }
    }

    /// Returns false for a duplicate
    pub fn add_trigger(&mut self, trigger: AttackTrigger) -> bool {
        if self.attack_triggers.iter().any(|t| t.same_call(&trigger)) {
            return false;
        }
        self.attack_triggers.push(trigger);
        true
    }

    pub fn observe(&mut self, key: SummaryKey) {
        if self.backward_stack.last() != Some(&key) {
            self.backward_stack.push(key);
        }
    }

    pub fn has_pattern(&self) -> bool {
        !self.attack_triggers.is_empty()
    }

    pub fn has_high_priority_pattern(&self) -> bool {
        self.attack_triggers.iter().any(AttackTrigger::is_high_priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(names: &[&str]) -> CallStack {
        names.iter().fold(CallStack::new(), |acc, n| {
            acc.push(SummaryKey::concrete(&MethodSignature::new(*n)))
        })
    }

    #[test]
    fn test_trigger_depth_and_dedupe() {
        let mut info = TaintedSourceInfo::new(TaintId(2), "A".into(), stack(&["A"]));
        let trigger = AttackTrigger {
            signature: "System.Void Test.Logger::Log(System.Object)".into(),
            call_stack: stack(&["A", "B"]),
        };
        assert_eq!(trigger.call_depth(), 3);
        assert!(info.add_trigger(trigger.clone()));
        assert!(!info.add_trigger(trigger));
        assert!(info.has_pattern());
        assert!(!info.has_high_priority_pattern());
    }

    #[test]
    fn test_observe_skips_repeats() {
        let mut info = TaintedSourceInfo::new(TaintId(2), "A".into(), stack(&["A"]));
        let key = SummaryKey::concrete(&MethodSignature::new("B"));
        info.observe(key.clone());
        info.observe(key);
        assert_eq!(info.backward_stack.len(), 1);
    }
}
