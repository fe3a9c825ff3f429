//! Domain models for the symbolic value graph
//!
//! - Entity: node of the symbolic heap with taint and deferred edges
//! - TaintId: clean / input / tainted-source ordering
//! - Slot: deferred union of entities or pending field loads

pub mod entity;
pub mod slot;
pub mod taint;

pub use entity::{Entity, EntityId, EntitySource, PossibleTaint, SinkCall, TargetCall};
pub use slot::{PendingLoad, Slot, SlotId};
pub use taint::TaintId;
