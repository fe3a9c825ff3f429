mod activation;
pub mod engine;
mod provenance;

pub use engine::SymbolicEngine;
