pub mod contexts;
pub mod execution_context;

pub use contexts::{ArgumentContext, StaticContext, VariableContext};
pub use execution_context::{ExecutionContext, FrozenContext};
