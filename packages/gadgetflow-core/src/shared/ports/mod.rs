//! Ports to external collaborators
//!
//! Binary loading and call indexing live outside this crate. The engine
//! talks to them through [`CallIndex`]; [`InMemoryCallIndex`] is a
//! self-contained implementation for tests and small embeddings.

mod call_index;
mod in_memory;

pub use call_index::{CallIndex, CallSite, ImplementationFilter, MethodDefinition};
pub use in_memory::InMemoryCallIndex;
