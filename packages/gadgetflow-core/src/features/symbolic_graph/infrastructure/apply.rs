//! Summary application
//!
//! Maps a callee-local graph into the caller graph. Starting from matched
//! roots (static root, formal arguments, return value) every reachable
//! callee entity gets a caller counterpart: existing fields are reused,
//! missing ones are loaded lazily, and two callee paths that reach the
//! same entity force the corresponding caller entities to merge.
//!
//! Taint ids and call stacks recorded inside the callee are rebased
//! through [`ApplyHooks`]; the graph itself never interprets them.

use super::graph::SymbolicGraph;
use crate::features::symbolic_graph::domain::{
    EntityId, EntitySource, PossibleTaint, SinkCall, TaintId, TargetCall,
};
use crate::shared::models::{CallStack, FieldKey};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Rebasing of callee-relative provenance into the caller's context
pub trait ApplyHooks {
    /// Caller-side id for a tainted-source id found in the callee graph
    fn rebase_taint(&mut self, taint: TaintId) -> TaintId;

    /// Caller-side stack for a stack captured during callee analysis
    fn rebase_stack(&mut self, stack: &CallStack) -> CallStack;
}

/// Keeps ids and stacks as they are
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityHooks;

impl ApplyHooks for IdentityHooks {
    fn rebase_taint(&mut self, taint: TaintId) -> TaintId {
        taint
    }

    fn rebase_stack(&mut self, stack: &CallStack) -> CallStack {
        stack.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// First (or only) implementation: callee provenance replaces the caller's
    Replace,
    /// Further virtual implementation unioned into a prior result
    Merge,
}

pub struct ApplyContext<'c> {
    callee: &'c SymbolicGraph,
    mode: ApplyMode,
    /// callee entity -> caller entity (may be forwarded; always resolve)
    matches: FxHashMap<EntityId, EntityId>,
    queue: VecDeque<EntityId>,
}

impl<'c> ApplyContext<'c> {
    pub fn new(callee: &'c SymbolicGraph, mode: ApplyMode) -> Self {
        Self {
            callee,
            mode,
            matches: FxHashMap::default(),
            queue: VecDeque::new(),
        }
    }

    /// Match `callee_root` with `caller_root` and copy everything reachable
    /// from it. Returns the caller entity now standing for the root.
    pub fn apply<H: ApplyHooks>(
        &mut self,
        caller: &mut SymbolicGraph,
        callee_root: EntityId,
        caller_root: EntityId,
        hooks: &mut H,
    ) -> EntityId {
        let c = self.callee.find(callee_root);
        let d = caller.resolve(caller_root);

        let target = match self.matches.get(&c).copied() {
            Some(previous) => {
                let previous = caller.resolve(previous);
                if previous != d {
                    caller.merge(previous, d)
                } else {
                    d
                }
            }
            None => {
                self.matches.insert(c, d);
                self.queue.push_back(c);
                d
            }
        };

        self.drain(caller, hooks);
        caller.find(target)
    }

    /// Caller value for a callee entity below an already matched root.
    ///
    /// Walks callee back-references up to the nearest matched ancestor and
    /// replays the field loads downward in the caller graph.
    pub fn get_matched_value<H: ApplyHooks>(
        &mut self,
        caller: &mut SymbolicGraph,
        callee_entity: EntityId,
        hooks: &mut H,
    ) -> Option<EntityId> {
        let value = self.lookup_matched(caller, callee_entity);
        self.drain(caller, hooks);
        value.map(|v| caller.find(v))
    }

    fn lookup_matched(
        &mut self,
        caller: &mut SymbolicGraph,
        callee_entity: EntityId,
    ) -> Option<EntityId> {
        let callee = self.callee;
        let target = callee.find(callee_entity);
        if let Some(m) = self.matches.get(&target) {
            return Some(caller.find(*m));
        }

        // parent -> (child it was reached from, key under which parent holds child)
        let mut reached: FxHashMap<EntityId, (EntityId, FieldKey)> = FxHashMap::default();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(target);
        queue.push_back(target);

        let mut anchor = None;
        'search: while let Some(node) = queue.pop_front() {
            let mut parents: Vec<(EntityId, FieldKey)> = callee
                .entity(node)
                .parents()
                .flat_map(|(p, keys)| keys.iter().map(move |k| (p, k.clone())))
                .collect();
            parents.sort();

            for (parent, key) in parents {
                let parent = callee.find(parent);
                if !visited.insert(parent) {
                    continue;
                }
                reached.insert(parent, (node, key));
                if self.matches.contains_key(&parent) {
                    anchor = Some(parent);
                    break 'search;
                }
                queue.push_back(parent);
            }
        }

        let anchor = anchor?;
        let mut node = anchor;
        let mut current = caller.find(self.matches[&anchor]);
        while node != target {
            let (child, key) = reached.get(&node)?.clone();
            current = caller.load_field(current, key);
            self.matches.insert(child, current);
            self.queue.push_back(child);
            node = child;
        }
        Some(current)
    }

    fn match_or_create(&mut self, caller: &mut SymbolicGraph, callee_entity: EntityId) -> EntityId {
        let target = self.callee.find(callee_entity);
        if let Some(value) = self.lookup_matched(caller, target) {
            return value;
        }

        // Not reachable from any matched root: bring it over as-is
        let fresh = caller.create(self.callee.entity(target).source.clone());
        self.matches.insert(target, fresh);
        self.queue.push_back(target);
        fresh
    }

    fn drain<H: ApplyHooks>(&mut self, caller: &mut SymbolicGraph, hooks: &mut H) {
        let callee = self.callee;

        while let Some(c) = self.queue.pop_front() {
            let Some(&mapped) = self.matches.get(&c) else {
                continue;
            };
            let d = caller.resolve(mapped);
            self.copy_state(caller, c, d, hooks);

            for (key, child) in callee.entity(c).sorted_fields() {
                let child = callee.find(child);
                let owner = caller.find(d);
                let loaded = caller.load_field(owner, key);

                match self.matches.get(&child).copied() {
                    Some(previous) => {
                        let previous = caller.find(previous);
                        if previous != loaded {
                            caller.merge(previous, loaded);
                        }
                    }
                    None => {
                        self.matches.insert(child, loaded);
                        self.queue.push_back(child);
                    }
                }
            }
        }
    }

    fn copy_state<H: ApplyHooks>(
        &mut self,
        caller: &mut SymbolicGraph,
        c: EntityId,
        d: EntityId,
        hooks: &mut H,
    ) {
        let callee = self.callee;
        let src = callee.entity(c);

        if let Some(source) = &src.source {
            let take = match (self.mode, &caller.entity(d).source) {
                (_, None) => true,
                (ApplyMode::Replace, Some(EntitySource::MethodReturn(_))) => {
                    !matches!(source, EntitySource::Argument(_) | EntitySource::Static)
                }
                _ => false,
            };
            if take {
                caller.set_source(d, source.clone());
            }
        }

        let taint = src.taint();
        if taint.is_tainted() {
            let rebased = hooks.rebase_taint(taint);
            let stack = src.taint_stack().map(|s| hooks.rebase_stack(s));
            caller.raise_taint(d, rebased, stack);
        } else if taint.is_input() {
            caller.raise_taint(d, TaintId::INPUT, None);
        }
        if src.is_deep_input() {
            caller.mark_input(d);
        }

        for call in src.target_calls() {
            let rebased = TargetCall {
                signature: call.signature.clone(),
                call_stack: hooks.rebase_stack(&call.call_stack),
            };
            caller.add_target_call(d, rebased);
        }

        let mut possible_input: Vec<EntityId> = src.possible_input().collect();
        possible_input.sort();
        for target in possible_input {
            let mapped = self.match_or_create(caller, target);
            caller.add_possible_input(d, mapped);
        }

        for edge in src.possible_tainted() {
            let mapped = self.match_or_create(caller, edge.target);
            caller.add_possible_tainted(
                d,
                PossibleTaint {
                    target: mapped,
                    sink: SinkCall {
                        signature: edge.sink.signature.clone(),
                        call_stack: hooks.rebase_stack(&edge.sink.call_stack),
                        offset: edge.sink.offset,
                    },
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{MethodSignature, SummaryKey};

    fn key(name: &str) -> FieldKey {
        FieldKey::new(name)
    }

    /// Shifts every tainted id by a fixed offset
    struct ShiftHooks(u32);

    impl ApplyHooks for ShiftHooks {
        fn rebase_taint(&mut self, taint: TaintId) -> TaintId {
            TaintId(taint.0 + self.0)
        }

        fn rebase_stack(&mut self, stack: &CallStack) -> CallStack {
            stack.push(SummaryKey::concrete(&MethodSignature::new("Rebased")))
        }
    }

    #[test]
    fn test_apply_copies_fields_and_taint() {
        let mut callee = SymbolicGraph::new();
        let arg = callee.create(Some(EntitySource::Argument(0)));
        let value = callee.create(None);
        callee.raise_taint(value, TaintId(2), None);
        callee.store_field(arg, key("f"), value);

        let mut caller = SymbolicGraph::new();
        let actual = caller.create(None);

        let mut ctx = ApplyContext::new(&callee, ApplyMode::Replace);
        ctx.apply(&mut caller, arg, actual, &mut IdentityHooks);

        let f = caller.field(actual, &key("f")).unwrap();
        assert_eq!(caller.taint(f), TaintId(2));
        assert_eq!(caller.taint(actual), TaintId::CLEAN);
        assert!(caller.check_invariants());
    }

    #[test]
    fn test_apply_merges_aliased_callee_paths() {
        // callee: this.f1 = this.f2
        let mut callee = SymbolicGraph::new();
        let this = callee.create(Some(EntitySource::Argument(0)));
        let shared = callee.load_field(this, key("f2"));
        callee.store_field(this, key("f1"), shared);

        let mut caller = SymbolicGraph::new();
        let object = caller.create(None);
        let tainted = caller.load_field(object, key("f2"));
        caller.raise_taint(tainted, TaintId(2), None);

        let mut ctx = ApplyContext::new(&callee, ApplyMode::Replace);
        ctx.apply(&mut caller, this, object, &mut IdentityHooks);

        let f1 = caller.field(object, &key("f1")).unwrap();
        let f2 = caller.field(object, &key("f2")).unwrap();
        assert_eq!(f1, f2);
        assert_eq!(caller.taint(f1), TaintId(2));
        assert!(caller.check_invariants());
    }

    #[test]
    fn test_apply_two_roots_to_same_entity_merges_caller_values() {
        // callee returns its argument
        let mut callee = SymbolicGraph::new();
        let arg = callee.create(Some(EntitySource::Argument(0)));

        let mut caller = SymbolicGraph::new();
        let actual = caller.create(None);
        let output = caller.create(None);
        caller.raise_taint(actual, TaintId(2), None);

        let mut ctx = ApplyContext::new(&callee, ApplyMode::Replace);
        ctx.apply(&mut caller, arg, actual, &mut IdentityHooks);
        ctx.apply(&mut caller, arg, output, &mut IdentityHooks);

        assert_eq!(caller.find(actual), caller.find(output));
        assert_eq!(caller.taint(output), TaintId(2));
    }

    #[test]
    fn test_apply_rebases_taint_and_stacks() {
        let mut callee = SymbolicGraph::new();
        let ret = callee.create(None);
        let stack = CallStack::new().push(SummaryKey::concrete(&MethodSignature::new("M")));
        callee.raise_taint(ret, TaintId(2), Some(stack.clone()));
        callee.add_target_call(
            ret,
            TargetCall {
                signature: MethodSignature::new("T"),
                call_stack: stack,
            },
        );

        let mut caller = SymbolicGraph::new();
        let output = caller.create(None);
        let mut ctx = ApplyContext::new(&callee, ApplyMode::Replace);
        ctx.apply(&mut caller, ret, output, &mut ShiftHooks(10));

        let entity = caller.entity(output);
        assert_eq!(entity.taint(), TaintId(12));
        assert_eq!(entity.taint_stack().unwrap().depth(), 2);
        assert_eq!(entity.target_calls()[0].call_stack.depth(), 2);
    }

    #[test]
    fn test_apply_never_lowers_caller_taint() {
        let mut callee = SymbolicGraph::new();
        let arg = callee.create(None);

        let mut caller = SymbolicGraph::new();
        let actual = caller.create(None);
        caller.raise_taint(actual, TaintId(9), None);

        let mut ctx = ApplyContext::new(&callee, ApplyMode::Merge);
        ctx.apply(&mut caller, arg, actual, &mut IdentityHooks);
        assert_eq!(caller.taint(actual), TaintId(9));
    }

    #[test]
    fn test_possible_edges_map_targets() {
        // callee: possible_input edge arg -> ret, ret unreachable from arg
        let mut callee = SymbolicGraph::new();
        let arg = callee.create(Some(EntitySource::Argument(0)));
        let ret = callee.create(None);
        callee.add_possible_input(arg, ret);

        let mut caller = SymbolicGraph::new();
        let actual = caller.create(None);
        let output = caller.create(None);

        let mut ctx = ApplyContext::new(&callee, ApplyMode::Replace);
        ctx.apply(&mut caller, arg, actual, &mut IdentityHooks);
        ctx.apply(&mut caller, ret, output, &mut IdentityHooks);

        let targets = caller.take_possible_input(actual);
        assert_eq!(targets.len(), 1);
        assert_eq!(caller.find(targets[0]), caller.find(output));
    }

    #[test]
    fn test_get_matched_value_replays_loads() {
        let mut callee = SymbolicGraph::new();
        let root = callee.create(None);
        let a = callee.load_field(root, key("a"));
        let b = callee.load_field(a, key("b"));
        let orphan = callee.create(None);

        let mut caller = SymbolicGraph::new();
        let caller_root = caller.create(None);

        let mut ctx = ApplyContext::new(&callee, ApplyMode::Replace);
        ctx.apply(&mut caller, root, caller_root, &mut IdentityHooks);

        let value = ctx
            .get_matched_value(&mut caller, b, &mut IdentityHooks)
            .unwrap();
        let caller_a = caller.field(caller_root, &key("a")).unwrap();
        assert_eq!(caller.field(caller_a, &key("b")), Some(value));

        assert!(ctx
            .get_matched_value(&mut caller, orphan, &mut IdentityHooks)
            .is_none());
    }
}
