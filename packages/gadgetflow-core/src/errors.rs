//! Error types for gadgetflow-core
//!
//! Fatal analysis failures only. Unresolvable callees degrade to
//! conservative summaries and never surface here; a recursive call that
//! has no summary yet is answered with `Summary::Empty`, not an error.

use crate::config::ConfigError;
use crate::shared::models::{MethodSignature, OpCode};
use thiserror::Error;

/// Fatal error aborting the analysis of one entry point
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Reserved opcode, `calli`/`jmp`, or a short form left after normalisation
    #[error("Unsupported opcode {opcode} at IL_{offset:04x} in {method}")]
    UnsupportedOpcode {
        opcode: OpCode,
        offset: u32,
        method: MethodSignature,
    },

    /// Pop from an empty operand stack
    #[error("Operand stack underflow at IL_{offset:04x} in {method}")]
    StackUnderflow { offset: u32, method: MethodSignature },

    /// Two control-flow paths reach one offset with different stack shapes
    #[error("Stack depth mismatch at merge point: {left} vs {right}")]
    StackDepthMismatch { left: usize, right: usize },

    /// Operand does not fit the opcode (e.g. `ldfld` without a field)
    #[error("Invalid operand for {opcode} at IL_{offset:04x}: expected {expected}")]
    InvalidOperand {
        opcode: OpCode,
        offset: u32,
        expected: &'static str,
    },

    /// Branch to an offset that starts no instruction
    #[error("Branch at IL_{offset:04x} targets unknown offset IL_{target:04x}")]
    InvalidBranchTarget { offset: u32, target: u32 },

    /// A method selected for analysis has no body
    #[error("Method {0} has no body")]
    MissingMethodBody(MethodSignature),

    /// `execute_forward` called twice on one engine instance
    #[error("Engine instance already ran an analysis; create a fresh engine per entry point")]
    EngineAlreadyUsed,

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Bytecode-shape failures (as opposed to usage/config errors)
    pub fn is_bytecode_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOpcode { .. }
                | Self::StackUnderflow { .. }
                | Self::StackDepthMismatch { .. }
                | Self::InvalidOperand { .. }
                | Self::InvalidBranchTarget { .. }
        )
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let err = AnalysisError::UnsupportedOpcode {
            opcode: OpCode::Calli,
            offset: 0x1a,
            method: MethodSignature::new("System.Void A::M()"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Calli"));
        assert!(msg.contains("IL_001a"));
        assert!(msg.contains("A::M"));
        assert!(err.is_bytecode_error());
        assert!(!AnalysisError::EngineAlreadyUsed.is_bytecode_error());
    }
}
