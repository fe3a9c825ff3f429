//! # Summary Cache & Fixpoint
//!
//! Interprocedural memoization keyed by `C:`/`V:` + method signature:
//! - [`Summary`]: immutable per-method result (or the `Empty` sentinel)
//! - [`SummaryCache`]: LRU store plus the created-types registry
//! - [`RecursionLoop`]: cycle bookkeeping for the fixpoint iteration
//! - [`summary_fingerprint`]: convergence check for loop heads

pub mod domain;
pub mod infrastructure;

pub use domain::{MethodSummary, RecursionLoop, Summary};
pub use infrastructure::{summary_fingerprint, SummaryCache};
