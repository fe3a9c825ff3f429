//! Execution environment building blocks

pub mod simple_types;
pub mod slot_table;
pub mod stack_frame;

pub use simple_types::is_simple_type;
pub use slot_table::SlotTable;
pub use stack_frame::StackFrame;
