//! Taint identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Taint state of an entity.
///
/// - `0`: untainted
/// - `1`: attacker-controlled input
/// - `>= 2`: a distinct tainted source instance (see `DataFlowAnalysisResult`)
///
/// Ordering is meaningful: merging keeps the maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaintId(pub u32);

impl TaintId {
    pub const CLEAN: TaintId = TaintId(0);
    pub const INPUT: TaintId = TaintId(1);
    pub const FIRST_SOURCE: TaintId = TaintId(2);

    /// Input or tainted source
    #[inline]
    pub fn is_input(&self) -> bool {
        self.0 >= 1
    }

    /// Distinct tainted source instance
    #[inline]
    pub fn is_tainted(&self) -> bool {
        self.0 >= 2
    }
}

impl fmt::Display for TaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("clean"),
            1 => f.write_str("input"),
            n => write!(f, "taint#{}", n),
        }
    }
}
