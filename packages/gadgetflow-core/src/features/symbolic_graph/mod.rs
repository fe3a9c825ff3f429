//! # Symbolic Value Graph
//!
//! Heap and taint abstraction shared by every analysis layer:
//! - **Entities** addressed by stable `EntityId`s in an arena
//! - **Merge** as union-find unification with atomic edge redirection
//! - **Apply** to map a callee summary graph into its caller
//! - **Slots** for deferred (lazily materialized) values
//!
//! ## Usage
//! ```text
//! let mut graph = SymbolicGraph::new();
//! let obj = graph.create(None);
//! let f = graph.load_field(obj, FieldKey::new("Test.Foo::f"));
//! graph.raise_taint(f, TaintId(2), None);
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{
    Entity, EntityId, EntitySource, PendingLoad, PossibleTaint, SinkCall, Slot, SlotId, TaintId,
    TargetCall,
};
pub use infrastructure::{
    ApplyContext, ApplyHooks, ApplyMode, IdentityHooks, SlotArena, SymbolicGraph,
};
