//! Symbolic graph infrastructure
//!
//! - graph: entity arena, union-find merge, taint transitions
//! - apply: callee-to-caller summary mapping
//! - slot_arena: deferred values and their normalization

pub mod apply;
pub mod graph;
pub mod slot_arena;

pub use apply::{ApplyContext, ApplyHooks, ApplyMode, IdentityHooks};
pub use graph::SymbolicGraph;
pub use slot_arena::SlotArena;
