//! Per-run taint bookkeeping

use crate::features::analysis_result::domain::{AttackTrigger, TaintedSourceInfo};
use crate::features::symbolic_graph::TaintId;
use crate::shared::models::{CallStack, MethodSignature, SummaryKey};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Append-only result of one `execute_forward` run
#[derive(Debug, Clone, Serialize)]
pub struct DataFlowAnalysisResult {
    sources: BTreeMap<TaintId, TaintedSourceInfo>,

    /// Re-identified ids: old -> new
    #[serde(skip)]
    redirects: FxHashMap<TaintId, TaintId>,

    #[serde(skip)]
    next_id: u32,

    has_pattern: bool,
    external_call_count: usize,
}

impl Default for DataFlowAnalysisResult {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            redirects: FxHashMap::default(),
            next_id: TaintId::FIRST_SOURCE.0,
            has_pattern: false,
            external_call_count: 0,
        }
    }
}

impl DataFlowAnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> TaintId {
        let id = TaintId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a sensitive sink call made by `method` and return the fresh
    /// taint id standing for its output
    pub fn add_tainted_method_call(
        &mut self,
        method: MethodSignature,
        forward_stack: CallStack,
    ) -> TaintId {
        let id = self.mint();
        if forward_stack.is_empty() {
            error!(taint = %id, method = %method, "Tainted source registered without call stack");
            debug_assert!(false, "tainted source without call stack");
        }
        if self.sources.contains_key(&id) {
            error!(taint = %id, "Duplicate tainted source id");
            debug_assert!(false, "duplicate tainted source id {}", id);
            return id;
        }

        debug!(taint = %id, method = %method, stack = %forward_stack, "Tainted source");
        self.sources
            .insert(id, TaintedSourceInfo::new(id, method, forward_stack));
        id
    }

    /// Re-identify `old` for a new provenance path. Accumulated triggers move
    /// to the new id; the old id keeps resolving to it.
    pub fn update_tainted_method(&mut self, old: TaintId, forward_stack: CallStack) -> TaintId {
        let old = self.resolve(old);
        let Some(mut info) = self.sources.remove(&old) else {
            error!(taint = %old, "Re-identification of an unknown taint id");
            debug_assert!(false, "unknown taint id {}", old);
            return old;
        };

        let id = self.mint();
        debug!(old = %old, new = %id, stack = %forward_stack, "Tainted source re-identified");
        info.id = id;
        info.forward_stack = forward_stack;
        self.sources.insert(id, info);
        self.redirects.insert(old, id);
        id
    }

    /// Current id for a possibly re-identified one
    pub fn resolve(&self, mut id: TaintId) -> TaintId {
        while let Some(next) = self.redirects.get(&id) {
            id = *next;
        }
        id
    }

    /// Record that taint `taint` reaches a trigger call. Returns true if
    /// this (signature, stack) pair is new for the taint id.
    pub fn add_attack_trigger_call(
        &mut self,
        taint: TaintId,
        signature: MethodSignature,
        call_stack: CallStack,
    ) -> bool {
        if !taint.is_tainted() {
            return false;
        }
        let id = self.resolve(taint);
        let Some(info) = self.sources.get_mut(&id) else {
            error!(taint = %id, signature = %signature, "Trigger for unknown taint id");
            debug_assert!(false, "trigger for unknown taint id {}", id);
            return false;
        };

        let trigger = AttackTrigger {
            signature,
            call_stack,
        };
        let depth = trigger.call_depth();
        let signature = trigger.signature.clone();
        if !info.add_trigger(trigger) {
            return false;
        }
        info!(taint = %id, trigger = %signature, depth, "Attack trigger reached");
        self.has_pattern = true;
        true
    }

    /// Note that the value tainted by `taint` was returned into `caller`
    pub fn observe(&mut self, taint: TaintId, caller: SummaryKey) {
        let id = self.resolve(taint);
        if let Some(info) = self.sources.get_mut(&id) {
            info.observe(caller);
        }
    }

    pub fn record_external_call(&mut self) {
        self.external_call_count += 1;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub fn source(&self, id: TaintId) -> Option<&TaintedSourceInfo> {
        self.sources.get(&self.resolve(id))
    }

    pub fn sources(&self) -> impl Iterator<Item = &TaintedSourceInfo> {
        self.sources.values()
    }

    pub fn has_pattern(&self) -> bool {
        self.has_pattern
    }

    pub fn tainted_object_count(&self) -> usize {
        self.sources.len()
    }

    /// Taint ids with at least one trigger
    pub fn pattern_count(&self) -> usize {
        self.sources.values().filter(|s| s.has_pattern()).count()
    }

    pub fn high_priority_pattern_count(&self) -> usize {
        self.sources
            .values()
            .filter(|s| s.has_high_priority_pattern())
            .count()
    }

    pub fn external_call_count(&self) -> usize {
        self.external_call_count
    }

    /// Every trigger of every source, in id order
    pub fn attack_triggers(&self) -> impl Iterator<Item = (TaintId, &AttackTrigger)> {
        self.sources
            .values()
            .flat_map(|s| s.attack_triggers.iter().map(move |t| (s.id, t)))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stack(names: &[&str]) -> CallStack {
        names.iter().fold(CallStack::new(), |acc, n| {
            acc.push(SummaryKey::concrete(&MethodSignature::new(*n)))
        })
    }

    fn invoke() -> MethodSignature {
        MethodSignature::new(
            "System.Object System.Reflection.MethodBase::Invoke(System.Object,System.Object[])",
        )
    }

    #[test]
    fn test_ids_start_after_input() {
        let mut result = DataFlowAnalysisResult::new();
        let a = result.add_tainted_method_call("A".into(), stack(&["A"]));
        let b = result.add_tainted_method_call("A".into(), stack(&["A"]));
        assert_eq!(a, TaintId(2));
        assert_eq!(b, TaintId(3));
        assert_eq!(result.tainted_object_count(), 2);
        assert!(!result.has_pattern());
    }

    #[test]
    fn test_trigger_flips_pattern() {
        let mut result = DataFlowAnalysisResult::new();
        let id = result.add_tainted_method_call("A".into(), stack(&["A"]));

        assert!(!result.add_attack_trigger_call(TaintId::INPUT, invoke(), stack(&["A"])));
        assert!(result.add_attack_trigger_call(id, invoke(), stack(&["A"])));
        assert!(!result.add_attack_trigger_call(id, invoke(), stack(&["A"])));

        assert!(result.has_pattern());
        assert_eq!(result.pattern_count(), 1);
        assert_eq!(result.high_priority_pattern_count(), 1);
        assert_eq!(result.attack_triggers().count(), 1);
    }

    #[test]
    fn test_update_migrates_triggers() {
        let mut result = DataFlowAnalysisResult::new();
        let old = result.add_tainted_method_call("A".into(), stack(&["A"]));
        result.add_attack_trigger_call(old, invoke(), stack(&["A"]));

        let new = result.update_tainted_method(old, stack(&["B", "A"]));
        assert_ne!(old, new);
        assert_eq!(result.resolve(old), new);
        assert_eq!(result.tainted_object_count(), 1);

        let info = result.source(old).unwrap();
        assert_eq!(info.id, new);
        assert_eq!(info.attack_triggers.len(), 1);
        assert_eq!(info.forward_stack.depth(), 2);

        // Triggers through the old id land on the new one
        assert!(result.add_attack_trigger_call(old, invoke(), stack(&["B"])));
        assert_eq!(result.source(new).unwrap().attack_triggers.len(), 2);
    }

    #[test]
    fn test_to_json() {
        let mut result = DataFlowAnalysisResult::new();
        let id = result.add_tainted_method_call("A".into(), stack(&["A"]));
        result.add_attack_trigger_call(id, invoke(), stack(&["A"]));
        result.record_external_call();

        let json = result.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["has_pattern"], serde_json::json!(true));
        assert_eq!(value["external_call_count"], serde_json::json!(1));
        assert_eq!(
            value["sources"]["2"]["forward_stack"],
            serde_json::json!(["C:A"])
        );
    }
}
