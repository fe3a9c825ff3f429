/*
 * GadgetFlow Core - Deserialization Gadget Chain Analysis
 *
 * Feature-First Hexagonal Architecture:
 * - shared/   : Metadata models (methods, bytecode, call stacks) and the call index port
 * - features/ : symbolic_graph -> execution_env -> interpreter -> summary_cache -> taint_engine
 * - config/   : Presets, YAML files, validation
 *
 * One engine analyzes one entry point; the scanner fans entry points out
 * over rayon.
 */

#![allow(clippy::new_without_default)] // Default derived where it carries meaning
#![allow(clippy::module_inception)] // Module naming intentional

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and ports
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{EngineConfig, Preset};
pub use errors::{AnalysisError, Result};
pub use features::analysis_result::{AttackTrigger, DataFlowAnalysisResult, TaintedSourceInfo};
pub use features::taint_engine::{
    CancellationToken, EngineStatistics, EntryPoint, ScanOutcome, ScanReport, SymbolicEngine,
    TaintScanner,
};
pub use shared::ports::{CallIndex, InMemoryCallIndex, MethodDefinition};
