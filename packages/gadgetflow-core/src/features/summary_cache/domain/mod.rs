pub mod recursion;
pub mod summary;

pub use recursion::RecursionLoop;
pub use summary::{MethodSummary, Summary};
