//! Shared models: metadata references, bytecode and call stacks

pub mod bytecode;
pub mod call_stack;
pub mod method;

pub use bytecode::{
    ExceptionHandler, HandlerKind, Instruction, MethodBody, OpCode, Operand, ValueKind,
};
pub use call_stack::{CallKind, CallStack, SummaryKey};
pub use method::{FieldKey, FieldRef, MethodRef, MethodSignature, TypeRef};
