//! Feature modules - each feature follows the hexagonal layout
//!
//! - domain/         - Pure data types and rules
//! - infrastructure/ - Algorithms over the domain types
//! - application/    - Use cases composed from the layers below

pub mod analysis_result;
pub mod execution_env;
pub mod interpreter;
pub mod summary_cache;
pub mod symbolic_graph;
pub mod taint_engine;
