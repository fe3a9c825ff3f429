//! Operand stack frame

use crate::errors::{AnalysisError, Result};
use crate::features::symbolic_graph::{SlotArena, SlotId, SymbolicGraph};

/// Operand stack of one control-flow path.
///
/// Forking copies slot ids only; slots themselves are shared between the
/// two successors of a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    slots: Vec<SlotId>,
}

impl StackFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(slots: Vec<SlotId>) -> Self {
        Self { slots }
    }

    #[inline]
    pub fn push(&mut self, slot: SlotId) {
        self.slots.push(slot);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<SlotId> {
        self.slots.pop()
    }

    pub fn peek(&self) -> Option<SlotId> {
        self.slots.last().copied()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn fork(&self) -> StackFrame {
        self.clone()
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// Position-wise union of two frames reaching the same offset
    pub fn merge(
        &self,
        other: &StackFrame,
        arena: &mut SlotArena,
        graph: &mut SymbolicGraph,
    ) -> Result<StackFrame> {
        if self.depth() != other.depth() {
            return Err(AnalysisError::StackDepthMismatch {
                left: self.depth(),
                right: other.depth(),
            });
        }

        let slots = self
            .slots
            .iter()
            .zip(other.slots.iter())
            .map(|(a, b)| arena.union(graph, *a, *b))
            .collect();
        Ok(StackFrame { slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::symbolic_graph::Slot;

    #[test]
    fn test_fork_shares_slots() {
        let mut arena = SlotArena::new();
        let mut frame = StackFrame::new();
        frame.push(arena.fake());
        let forked = frame.fork();
        assert_eq!(forked.slots(), frame.slots());
    }

    #[test]
    fn test_merge_unions_positions() {
        let mut graph = SymbolicGraph::new();
        let mut arena = SlotArena::new();
        let a = graph.create(None);
        let b = graph.create(None);
        let left = StackFrame::with_slots(vec![arena.entity(a)]);
        let right = StackFrame::with_slots(vec![arena.entity(b)]);

        let merged = left.merge(&right, &mut arena, &mut graph).unwrap();
        assert_eq!(merged.depth(), 1);
        assert_eq!(arena.get(merged.slots()[0]), &Slot::Values(vec![a, b]));
    }

    #[test]
    fn test_merge_depth_mismatch_is_fatal() {
        let mut graph = SymbolicGraph::new();
        let mut arena = SlotArena::new();
        let left = StackFrame::with_slots(vec![arena.fake()]);
        let right = StackFrame::new();

        let err = left.merge(&right, &mut arena, &mut graph).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::StackDepthMismatch { left: 1, right: 0 }
        ));
    }
}
