pub mod control_flow;
pub mod interpreter;

pub use control_flow::ControlFlow;
pub use interpreter::Interpreter;
