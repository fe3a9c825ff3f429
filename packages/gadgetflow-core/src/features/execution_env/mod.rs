//! # Execution Environment
//!
//! Argument, local and static slot tables plus the operand stack frame of
//! one method activation. Stores union rather than overwrite; frames fork
//! at conditional branches and merge where paths join.

pub mod domain;
pub mod infrastructure;

pub use domain::{is_simple_type, SlotTable, StackFrame};
pub use infrastructure::{
    ArgumentContext, ExecutionContext, FrozenContext, StaticContext, VariableContext,
};
