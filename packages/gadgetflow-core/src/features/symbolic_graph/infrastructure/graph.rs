//! Arena-backed symbolic heap
//!
//! Entities live in a `Vec` and are addressed by `EntityId`. Merging is a
//! union-find rewrite: the absorbed node becomes a forwarding pointer to
//! its survivor and all of its edges are moved over, so every id handed
//! out stays valid for the lifetime of the graph.
//!
//! Taint changes are recorded as transitions; the driver drains them to
//! promote deferred edges and fire trigger calls.

use crate::features::symbolic_graph::domain::{
    Entity, EntityId, EntitySource, PossibleTaint, TaintId, TargetCall,
};
use crate::shared::models::{CallStack, FieldKey};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Node {
    Live(Entity),
    /// Merged into another entity
    Forwarded(EntityId),
}

#[derive(Debug, Clone, Default)]
pub struct SymbolicGraph {
    nodes: Vec<Node>,
    live_count: usize,
    transitions: Vec<EntityId>,
}

impl SymbolicGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena size (live + forwarded)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn create(&mut self, source: Option<EntitySource>) -> EntityId {
        let id = EntityId(self.nodes.len() as u32);
        self.nodes.push(Node::Live(Entity::new(source)));
        self.live_count += 1;
        id
    }

    /// Representative of `id` (no path compression)
    #[inline]
    pub fn find(&self, id: EntityId) -> EntityId {
        let mut current = id;
        while let Node::Forwarded(next) = &self.nodes[current.index()] {
            current = *next;
        }
        current
    }

    /// Representative of `id` with path compression
    pub fn resolve(&mut self, id: EntityId) -> EntityId {
        let root = self.find(id);
        let mut current = id;
        while current != root {
            let next = match &self.nodes[current.index()] {
                Node::Forwarded(next) => *next,
                Node::Live(_) => break,
            };
            self.nodes[current.index()] = Node::Forwarded(root);
            current = next;
        }
        root
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        let root = self.find(id);
        match &self.nodes[root.index()] {
            Node::Live(entity) => entity,
            Node::Forwarded(_) => unreachable!("find returns live entities"),
        }
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        let root = self.find(id);
        match &mut self.nodes[root.index()] {
            Node::Live(entity) => entity,
            Node::Forwarded(_) => unreachable!("find returns live entities"),
        }
    }

    #[inline]
    pub fn taint(&self, id: EntityId) -> TaintId {
        self.entity(id).taint
    }

    pub fn set_source(&mut self, id: EntityId, source: EntitySource) {
        self.entity_mut(id).source = Some(source);
    }

    /// Live entity ids in arena order
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, Node::Live(_)))
            .map(|(i, _)| EntityId(i as u32))
    }

    // ═══════════════════════════════════════════════════════════════
    // Fields
    // ═══════════════════════════════════════════════════════════════

    fn link(&mut self, owner: EntityId, key: FieldKey, child: EntityId) {
        self.entity_mut(owner).fields.insert(key.clone(), child);
        self.entity_mut(child)
            .parents
            .entry(owner)
            .or_default()
            .insert(key);
    }

    pub fn field(&self, owner: EntityId, key: &FieldKey) -> Option<EntityId> {
        self.entity(owner).field(key).map(|child| self.find(child))
    }

    /// Child under `key`, created on first access.
    ///
    /// Children of a deep-input owner are input themselves.
    pub fn load_field(&mut self, owner: EntityId, key: FieldKey) -> EntityId {
        let owner = self.resolve(owner);
        if let Some(child) = self.entity(owner).field(&key) {
            return self.find(child);
        }

        let deep = self.entity(owner).deep_input;
        let child = self.create(Some(EntitySource::UnknownField(key.clone())));
        if deep {
            let entity = self.entity_mut(child);
            entity.deep_input = true;
            entity.taint = TaintId::INPUT;
        }
        self.link(owner, key, child);
        child
    }

    /// Store `value` under `key`, unifying with any existing child
    pub fn store_field(&mut self, owner: EntityId, key: FieldKey, value: EntityId) {
        let owner = self.resolve(owner);
        let value = self.resolve(value);

        match self.entity(owner).field(&key) {
            Some(existing) => {
                self.merge(existing, value);
            }
            None => {
                self.link(owner, key, value);
                if self.entity(owner).deep_input {
                    self.mark_input(value);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Merge
    // ═══════════════════════════════════════════════════════════════

    /// Unify `a` and `b`; returns the surviving entity.
    ///
    /// Conflicting fields are unified through a worklist, so arbitrarily
    /// deep or cyclic structures merge without native recursion.
    pub fn merge(&mut self, a: EntityId, b: EntityId) -> EntityId {
        let mut worklist = vec![(a, b)];
        let mut promote = Vec::new();

        while let Some((x, y)) = worklist.pop() {
            let x = self.resolve(x);
            let y = self.resolve(y);
            if x == y {
                continue;
            }
            // Older entity survives
            let (survivor, absorbed) = if x < y { (x, y) } else { (y, x) };
            self.absorb(survivor, absorbed, &mut worklist, &mut promote);
        }

        for id in promote {
            self.mark_input(id);
        }
        self.resolve(a)
    }

    fn absorb(
        &mut self,
        x: EntityId,
        y: EntityId,
        worklist: &mut Vec<(EntityId, EntityId)>,
        promote: &mut Vec<EntityId>,
    ) {
        let Node::Live(absorbed) =
            std::mem::replace(&mut self.nodes[y.index()], Node::Forwarded(x))
        else {
            return;
        };
        self.live_count -= 1;

        // Incoming edges: parent.key -> y becomes parent.key -> x
        for (parent, keys) in &absorbed.parents {
            if *parent == y {
                continue;
            }
            let parent = self.find(*parent);
            {
                let entity = self.entity_mut(parent);
                for key in keys {
                    entity.fields.insert(key.clone(), x);
                }
            }
            self.entity_mut(x)
                .parents
                .entry(parent)
                .or_default()
                .extend(keys.iter().cloned());
        }

        // Outgoing edges: y.key -> child moves to x, unifying on conflict
        let deep_survivor = self.entity(x).deep_input && !absorbed.deep_input;
        for (key, child) in absorbed.fields {
            let child = self.find(child);
            if deep_survivor {
                promote.push(child);
            }
            self.entity_mut(child).parents.remove(&y);

            match self.entity(x).field(&key) {
                Some(existing) => {
                    let existing = self.find(existing);
                    if existing != child {
                        worklist.push((existing, child));
                    }
                }
                None => self.link(x, key, child),
            }
        }

        let entity = self.entity_mut(x);
        if absorbed.taint > entity.taint {
            entity.taint = absorbed.taint;
            entity.taint_stack = absorbed.taint_stack;
        }
        if entity.source.is_none() {
            entity.source = absorbed.source;
        }
        for call in absorbed.target_calls {
            entity.push_target_call(call);
        }
        entity.possible_input.extend(absorbed.possible_input);
        for edge in absorbed.possible_tainted {
            entity.push_possible_tainted(edge);
        }
        if absorbed.deep_input && !entity.deep_input {
            promote.push(x);
        }

        self.transitions.push(x);
    }

    // ═══════════════════════════════════════════════════════════════
    // Taint
    // ═══════════════════════════════════════════════════════════════

    /// Raise the taint of `id`; never lowers it. Returns true on change.
    pub fn raise_taint(&mut self, id: EntityId, taint: TaintId, stack: Option<CallStack>) -> bool {
        let id = self.resolve(id);
        let entity = self.entity_mut(id);
        if taint <= entity.taint {
            return false;
        }
        entity.taint = taint;
        if stack.is_some() {
            entity.taint_stack = stack;
        }
        self.transitions.push(id);
        true
    }

    /// Mark `id` and all of its descendants as input
    pub fn mark_input(&mut self, id: EntityId) {
        let mut work = vec![id];
        while let Some(current) = work.pop() {
            let current = self.resolve(current);
            let entity = self.entity_mut(current);
            if entity.deep_input {
                continue;
            }
            entity.deep_input = true;
            if entity.taint < TaintId::INPUT {
                entity.taint = TaintId::INPUT;
            }
            work.extend(entity.fields.values().copied());
            self.transitions.push(current);
        }
    }

    pub fn add_target_call(&mut self, id: EntityId, call: TargetCall) {
        let id = self.resolve(id);
        if self.entity_mut(id).push_target_call(call) {
            self.transitions.push(id);
        }
    }

    /// When `owner` becomes input, mark `target` input
    pub fn add_possible_input(&mut self, owner: EntityId, target: EntityId) {
        let owner = self.resolve(owner);
        let target = self.resolve(target);
        if owner == target {
            return;
        }
        if self.entity_mut(owner).possible_input.insert(target) {
            self.transitions.push(owner);
        }
    }

    pub fn add_possible_tainted(&mut self, owner: EntityId, edge: PossibleTaint) {
        let owner = self.resolve(owner);
        self.entity_mut(owner).push_possible_tainted(edge);
        self.transitions.push(owner);
    }

    pub fn take_possible_input(&mut self, id: EntityId) -> Vec<EntityId> {
        let ids: Vec<EntityId> = std::mem::take(&mut self.entity_mut(id).possible_input)
            .into_iter()
            .collect();
        let mut ids: Vec<EntityId> = ids.into_iter().map(|t| self.find(t)).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn take_possible_tainted(&mut self, id: EntityId) -> Vec<PossibleTaint> {
        std::mem::take(&mut self.entity_mut(id).possible_tainted)
    }

    /// Entities whose taint or deferred edges changed since the last drain
    pub fn drain_transitions(&mut self) -> Vec<EntityId> {
        let raw = std::mem::take(&mut self.transitions);
        let mut seen = FxHashSet::default();
        raw.into_iter()
            .map(|id| self.find(id))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════

    /// Entities reachable from `roots` through fields, breadth-first,
    /// fields visited in name order
    pub fn reachable_from(&self, roots: &[EntityId]) -> Vec<EntityId> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<EntityId> = roots.iter().map(|r| self.find(*r)).collect();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            for (_, child) in self.entity(current).sorted_fields() {
                queue.push_back(self.find(child));
            }
        }
        order
    }

    /// Every field edge has a matching back-reference and vice versa,
    /// and no edge points at a forwarded node.
    pub fn check_invariants(&self) -> bool {
        for id in self.entity_ids() {
            let entity = self.entity(id);
            for (key, child) in entity.fields() {
                if self.find(child) != child {
                    return false;
                }
                let back = self.entity(child).parents.get(&id);
                if !back.is_some_and(|keys| keys.contains(key)) {
                    return false;
                }
            }
            for (parent, keys) in entity.parents() {
                if self.find(parent) != parent {
                    return false;
                }
                for key in keys {
                    if self.entity(parent).field(key) != Some(id) {
                        return false;
                    }
                }
            }
        }
        true
    }
}
