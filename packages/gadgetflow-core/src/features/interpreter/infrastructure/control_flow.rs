//! Join points and back-edge bookkeeping for the linear scan

use crate::errors::Result;
use crate::features::execution_env::StackFrame;
use crate::features::symbolic_graph::{SlotArena, SymbolicGraph};
use crate::shared::models::{MethodBody, Operand};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
pub struct ControlFlow {
    index_of: FxHashMap<u32, usize>,
    /// Frame waiting at each instruction index
    pending: Vec<Option<StackFrame>>,
    taken_back_edges: FxHashSet<(usize, usize)>,
    /// Instructions below this index run exactly once, in order, before
    /// any branch, join, or protected region
    straight_line_end: usize,
}

impl ControlFlow {
    pub fn new(body: &MethodBody) -> Self {
        let index_of = body
            .instructions
            .iter()
            .enumerate()
            .map(|(i, instr)| (instr.offset, i))
            .collect();
        let straight_line_end = straight_line_end(body, &index_of);
        Self {
            index_of,
            pending: vec![None; body.instructions.len()],
            taken_back_edges: FxHashSet::default(),
            straight_line_end,
        }
    }

    /// Whether the instruction at `index` dominates every later one
    pub fn is_straight_line(&self, index: usize) -> bool {
        index < self.straight_line_end
    }

    pub fn index(&self, offset: u32) -> Option<usize> {
        self.index_of.get(&offset).copied()
    }

    /// Join `frame` into whatever already waits at `index`
    pub fn enqueue(
        &mut self,
        index: usize,
        frame: StackFrame,
        slots: &mut SlotArena,
        graph: &mut SymbolicGraph,
    ) -> Result<()> {
        let Some(waiting) = self.pending.get_mut(index) else {
            return Ok(());
        };
        *waiting = Some(match waiting.take() {
            Some(existing) => existing.merge(&frame, slots, graph)?,
            None => frame,
        });
        Ok(())
    }

    pub fn take(&mut self, index: usize) -> Option<StackFrame> {
        self.pending.get_mut(index).and_then(Option::take)
    }

    pub fn has_pending(&self, index: usize) -> bool {
        self.pending.get(index).is_some_and(Option::is_some)
    }

    /// True the first time the edge `from -> to` is taken
    pub fn take_back_edge(&mut self, from: usize, to: usize) -> bool {
        self.taken_back_edges.insert((from, to))
    }
}

fn straight_line_end(body: &MethodBody, index_of: &FxHashMap<u32, usize>) -> usize {
    let mut end = body.instructions.len();
    let mut cap = |offset: u32| {
        if let Some(&index) = index_of.get(&offset) {
            end = end.min(index);
        }
    };

    for handler in &body.exception_handlers {
        cap(handler.try_start);
        cap(handler.handler_start);
        if let Some(filter) = handler.filter_start {
            cap(filter);
        }
    }
    for instruction in &body.instructions {
        match &instruction.operand {
            Operand::Target(target) => cap(*target),
            Operand::Targets(targets) => targets.iter().for_each(|t| cap(*t)),
            _ => {}
        }
    }

    // Code after the first branch may be skipped
    let first_branch = body
        .instructions
        .iter()
        .position(|i| matches!(i.operand, Operand::Target(_) | Operand::Targets(_)));
    match first_branch {
        Some(index) => end.min(index + 1),
        None => end,
    }
}
