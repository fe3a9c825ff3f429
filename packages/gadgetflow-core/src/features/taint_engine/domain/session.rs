//! Per-run analysis session
//!
//! Counters and memo tables that live exactly as long as one top-level
//! run. Threaded explicitly through the engine; nothing here is global.

use crate::features::symbolic_graph::TaintId;
use crate::shared::models::{CallStack, SummaryKey};
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct AnalysisSession {
    /// Summary applications made so far
    applications: u64,

    /// Sink call site (stack, offset) -> taint id minted for it
    sources: FxHashMap<(Vec<SummaryKey>, u32), TaintId>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp for the next summary application, starting at 1
    pub fn next_application(&mut self) -> u64 {
        self.applications += 1;
        self.applications
    }

    /// Id already minted for the sink call at (`stack`, `offset`)
    pub fn source_for(&self, stack: &CallStack, offset: u32) -> Option<TaintId> {
        self.sources.get(&(stack.to_vec(), offset)).copied()
    }

    pub fn remember_source(&mut self, stack: &CallStack, offset: u32, id: TaintId) {
        self.sources.insert((stack.to_vec(), offset), id);
    }
}
