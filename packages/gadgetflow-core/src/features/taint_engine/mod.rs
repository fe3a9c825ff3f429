//! # Taint Engine
//!
//! Interprocedural forward analysis from one entry point:
//! - [`SymbolicEngine`]: activation-stack driver over the interpreter
//! - [`TaintScanner`]: many entry points, one fresh engine each
//! - [`EngineStatistics`]: per-run counters
//!
//! Taint ids and trigger stacks are only meaningful within the
//! [`DataFlowAnalysisResult`](crate::features::analysis_result::DataFlowAnalysisResult)
//! of the run that produced them.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CancellationToken, ScanOutcome, ScanReport, TaintScanner};
pub use domain::{AnalysisSession, EngineStatistics, EntryPoint};
pub use infrastructure::SymbolicEngine;
