//! # Bytecode Interpreter
//!
//! Abstract interpretation of one method body over the symbolic graph.
//! Call instructions are surfaced as [`CallEffect`]s so that the driver
//! can resolve callees without recursion on the native stack.

pub mod domain;
pub mod infrastructure;

pub use domain::{CallEffect, CallEffectKind};
pub use infrastructure::{ControlFlow, Interpreter};
