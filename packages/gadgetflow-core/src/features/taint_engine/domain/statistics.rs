use serde::Serialize;

/// Counters of one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatistics {
    /// Method activations interpreted (re-analysis of loop heads included)
    pub analyzed_methods: usize,

    /// Summaries served from the cache
    pub cache_hits: usize,

    /// Recursion loops opened
    pub recursion_loops: usize,

    /// Virtual calls with zero or too many implementations
    pub unresolved_virtual_calls: usize,

    /// Calls answered with the conservative input-marking fallback
    pub conservative_calls: usize,

    /// Fresh taint ids minted at the sensitive sink
    pub sink_interceptions: usize,

    /// Instructions interpreted
    pub instructions: u64,
}

impl EngineStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate counters of another run
    pub fn merge(&mut self, other: &EngineStatistics) {
        self.analyzed_methods += other.analyzed_methods;
        self.cache_hits += other.cache_hits;
        self.recursion_loops += other.recursion_loops;
        self.unresolved_virtual_calls += other.unresolved_virtual_calls;
        self.conservative_calls += other.conservative_calls;
        self.sink_interceptions += other.sink_interceptions;
        self.instructions += other.instructions;
    }
}
