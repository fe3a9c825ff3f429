pub mod patterns;
pub mod taint_source;

pub use patterns::{is_delegate_invoke, is_high_priority, HIGH_PRIORITY_TRIGGERS};
pub use taint_source::{AttackTrigger, TaintedSourceInfo};
