//! # Analysis Result
//!
//! Append-only store of tainted sources and the attack triggers they reach.

pub mod domain;
pub mod infrastructure;

pub use domain::{AttackTrigger, TaintedSourceInfo};
pub use infrastructure::DataFlowAnalysisResult;
