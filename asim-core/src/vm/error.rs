//! Machine and engine errors

use thiserror::Error;

/// Result type of machine operations
pub type VmResult<T> = Result<T, VmError>;

/// Errors raised by the loader, the machine state and the instruction handlers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Name is not one of the fixed registers (or the register is read-only)
    #[error("Invalid register: {0}")]
    InvalidRegister(String),

    /// Operand is neither a register, a memory reference nor a literal
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// Memory index outside `[0, memoryLength)`
    #[error("Invalid memory address: {0}")]
    InvalidAddress(i64),

    /// Memory cell does not hold a numeric value
    #[error("Invalid value in memory at address {0}")]
    InvalidMemoryValue(usize),

    /// Vector load hit a non-numeric cell
    #[error("Invalid value at address {0}")]
    InvalidValue(usize),

    #[error("Stack overflow")]
    StackOverflow,

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    /// Popped value is not a valid cursor position
    #[error("Invalid return address: {0}")]
    InvalidReturnAddress(String),

    #[error("{opcode} expects {expected} operand(s), found {found}")]
    ArityMismatch {
        opcode: &'static str,
        expected: usize,
        found: usize,
    },

    /// Label declared twice in the same program
    #[error("Duplicate label '{label}' on line {line}")]
    DuplicateLabel { label: String, line: usize },

    /// Bit width other than 8, 16 or 32
    #[error("Unsupported bit width: {0}")]
    InvalidBitWidth(u32),

    /// Step requested before any program was loaded
    #[error("No program loaded")]
    NoProgram,
}

/// Instruction error tagged with the 1-based source line it was raised on
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Line {line}: {source}")]
pub struct EngineError {
    pub line: usize,
    #[source]
    pub source: VmError,
}

impl EngineError {
    pub fn new(line: usize, source: VmError) -> Self {
        Self { line, source }
    }

    /// Underlying machine error
    pub fn kind(&self) -> &VmError {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VmError::DivisionByZero;
        assert_eq!(err.to_string(), "Division by zero");

        let err = VmError::ArityMismatch { opcode: "MOV", expected: 2, found: 1 };
        assert!(err.to_string().contains("MOV expects 2"));
    }

    #[test]
    fn test_engine_error_carries_line() {
        let err = EngineError::new(7, VmError::UnknownLabel("loop".into()));
        assert_eq!(err.to_string(), "Line 7: Unknown label: loop");
        assert_eq!(err.kind(), &VmError::UnknownLabel("loop".into()));
    }
}
